// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for StoragePath manipulation

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stash_core::StoragePath;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    path: &'a str,
    name: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let path = StoragePath::new(input.path);

    let _ = path.segments().count();
    let _ = path.extension();
    let _ = path.name();
    assert_eq!(path.parent().is_none(), path.is_root());

    // A separator-free, non-empty name always lands directly below its parent
    if !input.name.is_empty() && !input.name.contains('/') {
        let child = path.join(input.name);
        assert!(path.is_parent_of(&child), "{path:?} / {child:?}");
        assert!(child.as_str().starts_with(&path.descendant_prefix()));
        assert_eq!(child.name(), Some(input.name));
    }
});
