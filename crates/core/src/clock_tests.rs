// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let start = clock.epoch_secs();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.epoch_secs(), start + 90);
}

#[test]
fn fake_clock_sets_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_secs(42);
    assert_eq!(clock.epoch_secs(), 42);
}

#[test]
fn system_clock_is_past_2020() {
    assert!(SystemClock.epoch_secs() > 1_577_836_800);
}
