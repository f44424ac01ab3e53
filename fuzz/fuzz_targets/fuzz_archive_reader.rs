//! Fuzz target for .1pux archive reading.
//!
//! Feeds arbitrary bytes through open, model construction, and a filtered
//! write to memory. Every stage may fail but must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pux_archive::{ExportArchive, FilterOptions, SelectionSpec};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let Ok(archive) = ExportArchive::from_bytes(data.to_vec()) else {
        return;
    };

    let spec = SelectionSpec::new().with_vault("Personal");
    for selection in [None, Some(&spec)] {
        if let Ok(filtered) = archive.select(selection) {
            let _ = filtered.write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default());
        }
    }
});
