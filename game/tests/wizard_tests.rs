use std::collections::BTreeSet;
use std::time::Duration;

use genius::color::Color;
use genius::mapping::{ColorMapping, MappingError, MappingStore};
use genius::notify::{NotificationKind, Notifications};
use genius::storage::MemoryStore;
use genius::wizard::{
    SLOT_TIMEOUT, SequentialWizard, SingleSlotMapper, SlotOutcome, WizardOutcome, WizardState,
};
use genius_engine::ButtonDown;

#[test]
fn six_accepted_presses_complete_and_persist_a_distinct_mapping() {
    let store = MemoryStore::new();
    let mut mappings = MappingStore::open(store.clone());
    let mut notes = Notifications::new();
    let mut wizard = SequentialWizard::new();
    wizard.start(&mut notes);

    let presses = [11, 2, 2, 8, 0, 11, 5, 3];
    for button in presses {
        wizard.handle_press(ButtonDown::new(button), &mut mappings, &mut notes);
    }

    assert_eq!(wizard.state(), WizardState::Complete);
    let mapping = wizard.mapping();
    assert!(mapping.is_complete());
    let buttons: BTreeSet<usize> = mapping.iter().map(|(_, b)| b).collect();
    assert_eq!(buttons.len(), 6);
    assert_eq!(mapping.get(Color::Red), Some(11));
    assert_eq!(mapping.get(Color::Green), Some(3));

    assert_eq!(mappings.current(), mapping);
    let reopened = MappingStore::open(store);
    assert_eq!(reopened.current(), mapping);
    assert_eq!(
        notes.last().map(|n| n.message.as_str()),
        Some("Configuration complete! All buttons mapped.")
    );
}

#[test]
fn duplicate_button_is_rejected_without_advancing() {
    let mut mappings = MappingStore::open(MemoryStore::new());
    let mut notes = Notifications::new();
    let mut wizard = SequentialWizard::new();
    wizard.start(&mut notes);

    assert!(matches!(
        wizard.handle_press(ButtonDown::new(3), &mut mappings, &mut notes),
        WizardOutcome::Mapped {
            color: Color::Red,
            button: 3,
            next: Some(Color::White)
        }
    ));
    assert_eq!(wizard.current_step(), 1);

    let outcome = wizard.handle_press(ButtonDown::new(3), &mut mappings, &mut notes);
    assert_eq!(
        outcome,
        WizardOutcome::Rejected {
            button: 3,
            owner: Color::Red
        }
    );
    assert_eq!(wizard.current_step(), 1);
    assert_eq!(wizard.mapping().len(), 1);
    assert_eq!(wizard.mapping().get(Color::Red), Some(3));

    let last = notes.last().unwrap();
    assert_eq!(last.kind, NotificationKind::Error);
    assert_eq!(last.message, "Button 3 is already mapped! Use another button.");
}

#[test]
fn cancel_discards_the_pass_and_persists_nothing() {
    let mut mappings = MappingStore::open(MemoryStore::new());
    let mut notes = Notifications::new();
    let mut wizard = SequentialWizard::new();
    wizard.start(&mut notes);
    for button in [9, 8, 7] {
        wizard.handle_press(ButtonDown::new(button), &mut mappings, &mut notes);
    }

    assert!(wizard.cancel(&mut notes));
    assert_eq!(wizard.state(), WizardState::Idle);
    assert!(wizard.mapping().is_empty());
    assert_eq!(mappings.load(), &ColorMapping::default_layout());
    assert!(!wizard.cancel(&mut notes));
}

#[test]
fn slot_times_out_and_leaves_the_mapping_unchanged() {
    let mut notes = Notifications::new();
    let mut slot = SingleSlotMapper::new(ColorMapping::default_layout());
    slot.start(Color::Yellow, &mut notes);

    assert!(!slot.tick(SLOT_TIMEOUT - Duration::from_millis(1), &mut notes));
    assert!(slot.is_active());
    assert!(slot.tick(Duration::from_millis(1), &mut notes));
    assert!(!slot.is_active());
    assert_eq!(notes.last().map(|n| n.kind), Some(NotificationKind::Warning));

    assert_eq!(slot.handle_press(ButtonDown::new(10), &mut notes), SlotOutcome::Ignored);
    assert_eq!(slot.working(), &ColorMapping::default_layout());
}

#[test]
fn slot_save_requires_all_six_colors() {
    let store = MemoryStore::new();
    let mut mappings = MappingStore::open(store);
    let mut notes = Notifications::new();
    let mut slot = SingleSlotMapper::new(ColorMapping::new());

    slot.start(Color::Red, &mut notes);
    slot.handle_press(ButtonDown::new(4), &mut notes);
    assert!(matches!(
        slot.save(&mut mappings, &mut notes),
        Err(MappingError::Incomplete { bound: 1 })
    ));
    assert_eq!(mappings.current(), &ColorMapping::default_layout());

    for (color, button) in [
        (Color::White, 5),
        (Color::Amber, 6),
        (Color::Blue, 7),
        (Color::Yellow, 8),
        (Color::Green, 9),
    ] {
        slot.start(color, &mut notes);
        assert_eq!(
            slot.handle_press(ButtonDown::new(button), &mut notes),
            SlotOutcome::Mapped { color, button }
        );
    }
    slot.save(&mut mappings, &mut notes).unwrap();
    assert_eq!(mappings.resolve(4), Some(Color::Red));
    assert_eq!(mappings.resolve(9), Some(Color::Green));
}
