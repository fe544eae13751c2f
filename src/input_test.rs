use super::*;

// =============================================================
// Pen detection
// =============================================================

#[test]
fn pen_kind_is_pen() {
    assert!(PointerEvent::pen(1, PointerPhase::Down, 0.0, 0.0, 0).looks_like_pen());
}

#[test]
fn plain_touch_and_mouse_are_not_pens() {
    assert!(!PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).looks_like_pen());
    assert!(!PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0, 0).looks_like_pen());
}

#[test]
fn tilt_reveals_pen() {
    let ev = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_tilt(15.0, 0.0);
    assert!(ev.looks_like_pen());
    let flat = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_tilt(0.0, 0.0);
    assert!(!flat.looks_like_pen());
}

#[test]
fn fractional_pressure_reveals_pen() {
    let ev = PointerEvent::mouse(PointerPhase::Down, 0.0, 0.0, 0).with_pressure(0.37);
    assert!(ev.looks_like_pen());
}

#[test]
fn canonical_pressures_are_not_pens() {
    for p in [0.0, 0.5, 1.0] {
        let ev = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_pressure(p);
        assert!(!ev.looks_like_pen(), "pressure {p}");
    }
}

// =============================================================
// Palm detection
// =============================================================

#[test]
fn wide_touch_is_palm() {
    let ev = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_contact(40.0, 10.0);
    assert!(ev.is_palm(25.0));
}

#[test]
fn tall_touch_is_palm() {
    let ev = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_contact(5.0, 30.0);
    assert!(ev.is_palm(25.0));
}

#[test]
fn fingertip_is_not_palm() {
    let ev = PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).with_contact(12.0, 14.0);
    assert!(!ev.is_palm(25.0));
    assert!(!PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0).is_palm(25.0));
}

#[test]
fn palm_rule_only_applies_to_touch() {
    let ev = PointerEvent::pen(1, PointerPhase::Down, 0.0, 0.0, 0).with_contact(40.0, 40.0);
    assert!(!ev.is_palm(25.0));
}

// =============================================================
// Buttons and serde
// =============================================================

#[test]
fn buttons_default_to_primary() {
    let ev = PointerEvent::pen(1, PointerPhase::Down, 0.0, 0.0, 0);
    assert!(ev.has_primary());
    assert!(!ev.has_secondary());
    let barrel = ev.with_buttons(BUTTON_PRIMARY | BUTTON_SECONDARY);
    assert!(barrel.has_secondary());
}

#[test]
fn event_deserializes_with_optional_fields_missing() {
    let json = r#"{"pointerId": 3, "kind": "touch", "phase": "down", "position": {"x": 1.0, "y": 2.0}, "timeMs": 10}"#;
    let ev: PointerEvent = serde_json::from_str(json).unwrap();
    assert_eq!(ev.pointer_id, 3);
    assert_eq!(ev.kind, PointerKind::Touch);
    assert_eq!(ev.buttons, BUTTON_PRIMARY);
    assert!(ev.pressure.is_none());
}

// =============================================================
// InputState
// =============================================================

#[test]
fn input_state_default_is_idle() {
    assert_eq!(InputState::default(), InputState::Idle);
    assert_eq!(InputState::Idle.owner(), None);
}

#[test]
fn owner_of_single_pointer_states() {
    let drawing = InputState::Drawing {
        pointer_id: 4,
        tool: Tool::default(),
        last_world: Point::new(0.0, 0.0),
        transient: false,
    };
    assert_eq!(drawing.owner(), Some(4));
    assert_eq!(InputState::Detached { pointer_id: 2 }.owner(), Some(2));
    let multi = InputState::MultiTouch {
        pair: None,
        start_distance: 1.0,
        start_zoom: 1.0,
        last_mid: Point::new(0.0, 0.0),
    };
    assert_eq!(multi.owner(), None);
}
