// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Distance-matrix loader checks against written fixtures

use std::fs::write;
use tempdir::TempDir;
use waypoint_runtime::DistanceMatrix;

#[test]
fn loads_a_written_matrix() {
    let dir = TempDir::new("waypoint-dm").expect("tempdir");
    let path = dir.path().join("dm.csv");
    write(&path, "3:3\n1,2,3\n4,5,6\n7,8,9\n").expect("fixture written");

    let matrix = DistanceMatrix::from_file(&path).expect("matrix loads");

    assert_eq!(matrix.rows(), 3);
    assert_eq!(matrix.cols(), 3);

    let expected = [[1, 2, 3], [4, 5, 6], [7, 8, 9]];
    for (row, cells) in expected.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            assert_eq!(
                matrix.get(row as u32, col as u32).expect("in bounds"),
                *cell
            );
        }
    }
}

#[test]
fn unreachable_cells_read_back_as_such() {
    let dir = TempDir::new("waypoint-dm").expect("tempdir");
    let path = dir.path().join("dm.csv");
    write(&path, "2:2\n0,-1\n12,3\n").expect("fixture written");

    let matrix = DistanceMatrix::from_file(&path).expect("matrix loads");

    assert!(matrix.is_reachable(0, 0).expect("in bounds"));
    assert!(!matrix.is_reachable(0, 1).expect("in bounds"));
    assert_eq!(matrix.get(1, 0).expect("in bounds"), 12);
}

#[test]
fn out_of_bounds_lookups_are_rejected() {
    let dir = TempDir::new("waypoint-dm").expect("tempdir");
    let path = dir.path().join("dm.csv");
    write(&path, "1:2\n5,6\n").expect("fixture written");

    let matrix = DistanceMatrix::from_file(&path).expect("matrix loads");

    assert!(matrix.get(0, 1).is_ok());
    assert!(matrix.get(1, 0).is_err());
    assert!(matrix.get(0, 2).is_err());
}

#[test]
fn malformed_files_are_rejected() {
    let dir = TempDir::new("waypoint-dm").expect("tempdir");

    let missing_header = dir.path().join("no-header.csv");
    write(&missing_header, "").expect("fixture written");
    assert!(DistanceMatrix::from_file(&missing_header).is_err());

    let short_row = dir.path().join("short-row.csv");
    write(&short_row, "2:3\n1,2,3\n4,5\n").expect("fixture written");
    assert!(DistanceMatrix::from_file(&short_row).is_err());

    let missing_row = dir.path().join("missing-row.csv");
    write(&missing_row, "2:2\n1,2\n").expect("fixture written");
    assert!(DistanceMatrix::from_file(&missing_row).is_err());

    let junk = dir.path().join("junk.csv");
    write(&junk, "2:2\n1,x\n3,4\n").expect("fixture written");
    assert!(DistanceMatrix::from_file(&junk).is_err());
}
