use genius_engine::{ButtonDown, ButtonLatch, GamepadSnapshot};

/// Counts contiguous runs of `true` in a per-tick pressed trace.
fn runs(trace: &[bool]) -> usize {
    let mut count = 0;
    let mut prev = false;
    for &pressed in trace {
        if pressed && !prev {
            count += 1;
        }
        prev = pressed;
    }
    count
}

fn trace_from_pattern(pattern: &str) -> Vec<bool> {
    pattern.chars().map(|c| c == '#').collect()
}

#[test]
fn one_button_down_per_pressed_run_regardless_of_run_length() {
    for pattern in [
        "",
        "#",
        "....",
        "####",
        "#.#.#.",
        "..####....#...######..",
        "#..........................#",
        "##.##.##.##.",
    ] {
        let trace = trace_from_pattern(pattern);
        let mut latch = ButtonLatch::new();
        let mut events = 0;
        for &pressed in &trace {
            let snapshot = if pressed {
                GamepadSnapshot::with_pressed(12, &[7])
            } else {
                GamepadSnapshot::released(12)
            };
            if let Some(down) = latch.next_press(&snapshot) {
                assert_eq!(down, ButtonDown::new(7));
                events += 1;
            }
        }
        assert_eq!(events, runs(&trace), "pattern {pattern:?}");
    }
}

#[test]
fn independent_buttons_each_get_their_own_edges() {
    let a = trace_from_pattern("##..##..##");
    let b = trace_from_pattern(".######...");
    let mut latch = ButtonLatch::new();
    let mut seen_a = 0;
    let mut seen_b = 0;

    // Pad the trace so deferred presses have ticks left to surface.
    for tick in 0..a.len() + 2 {
        let mut held = Vec::new();
        if a.get(tick).copied().unwrap_or(false) {
            held.push(0);
        }
        if b.get(tick).copied().unwrap_or(false) {
            held.push(1);
        }
        match latch.next_press(&GamepadSnapshot::with_pressed(2, &held)) {
            Some(ButtonDown { index: 0 }) => seen_a += 1,
            Some(ButtonDown { index: 1 }) => seen_b += 1,
            Some(other) => panic!("unexpected {other:?}"),
            None => {}
        }
    }

    assert_eq!(seen_a, runs(&a));
    assert_eq!(seen_b, runs(&b));
}

#[test]
fn never_reports_indices_beyond_the_snapshot() {
    let mut latch = ButtonLatch::new();
    latch.next_press(&GamepadSnapshot::released(16));
    for _ in 0..3 {
        let down = latch.next_press(&GamepadSnapshot::with_pressed(2, &[1]));
        assert!(down.is_none_or(|d| d.index < 2));
    }
}

#[test]
fn reconnect_with_fewer_buttons_does_not_panic() {
    let mut latch = ButtonLatch::new();
    assert_eq!(
        latch.next_press(&GamepadSnapshot::with_pressed(17, &[16])),
        Some(ButtonDown::new(16))
    );
    assert_eq!(latch.next_press(&GamepadSnapshot::new(Vec::new())), None);
    assert_eq!(
        latch.next_press(&GamepadSnapshot::with_pressed(4, &[0])),
        Some(ButtonDown::new(0))
    );
    assert!(!latch.is_held(16));
}
