// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - mesh import/export and labelmap serialization

mod nrrd;
mod stl;

pub use nrrd::{read_nrrd, read_nrrd_from, write_nrrd, write_nrrd_to};
pub use stl::{export_stl, export_stl_to, import_stl, import_stl_from};
