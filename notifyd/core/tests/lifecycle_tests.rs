//! Notification lifecycle tests
//!
//! Drive a [`NotificationManager`] against the headless platform and check
//! store, placement and surface state after each step.

use notifyd_core::{
    handle_call, Anchor, CloseReason, ErrorKind, FontDescriptor, HeadlessPlatform, MonospaceText,
    NotificationId, NotificationManager, NotifyError, NotifyParams, NotifyRequest, NotifydConfig,
    ServiceCall, ServiceReply, SizingEngine, SurfaceId,
};
use pretty_assertions::assert_eq;

type Manager = NotificationManager<HeadlessPlatform, MonospaceText>;

/// Default config: padding 15, spacing 10, min 300x50, top-right
const SPACING: i32 = 10;

fn text() -> MonospaceText {
    MonospaceText::without_system_fonts(FontDescriptor::default())
}

fn manager() -> Manager {
    manager_with(NotifydConfig::default())
}

fn manager_with(config: NotifydConfig) -> Manager {
    NotificationManager::create(config, HeadlessPlatform::new(), text())
}

/// Deliver platform events until the compositor goes quiet
fn pump(manager: &mut Manager) {
    for _ in 0..16 {
        if manager.dispatch_platform_events() == 0 {
            return;
        }
    }
    panic!("platform never went quiet");
}

fn id(raw: u32) -> NotificationId {
    NotificationId::new(raw).unwrap()
}

fn surface_of(manager: &Manager, id: NotificationId) -> SurfaceId {
    manager.store().get(id).unwrap().surface()
}

fn top_margin(manager: &Manager, id: NotificationId) -> i32 {
    let surface = surface_of(manager, id);
    manager.platform().surface(surface).unwrap().margins().top
}

// =============================================================================
// Store invariants
// =============================================================================

#[test]
fn test_end_to_end_create_then_replace() {
    let mut m = manager();

    let first = m
        .upsert_at(NotifyParams::new("Build").with_body("Finished").from_app("ci"), 0)
        .unwrap();
    assert_eq!(first, id(1));

    let entries: Vec<_> = m
        .store()
        .iter()
        .map(|n| (n.id(), n.summary().to_string(), n.body().map(str::to_string), n.position_index()))
        .collect();
    assert_eq!(
        entries,
        vec![(id(1), "Build".to_string(), Some("Finished".to_string()), 0)]
    );

    let second = m
        .upsert_at(
            NotifyParams::new("Build").with_body("Failed").from_app("ci").replacing(1),
            10,
        )
        .unwrap();
    assert_eq!(second, id(1));
    assert_eq!(m.store().len(), 1);

    let n = m.store().get(id(1)).unwrap();
    assert_eq!(n.body(), Some("Failed"));
    assert_eq!(n.created_at(), 10);
}

#[test]
fn test_store_never_exceeds_capacity() {
    let mut m = manager();
    let capacity = m.config().behavior.max_notifications;

    for i in 0..60u32 {
        let params = NotifyParams::new(format!("n{i}")).replacing(i % 9);
        let _ = m.upsert_at(params, u64::from(i));
        assert!(m.store().len() <= capacity);

        let positions: Vec<_> = m.store().iter().map(|n| n.position_index()).collect();
        assert_eq!(positions, (0..m.store().len()).collect::<Vec<_>>());
    }
}

#[test]
fn test_full_store_rejects_with_capacity_error() {
    let mut m = manager();
    for i in 0..5 {
        m.upsert_at(NotifyParams::new(format!("n{i}")), 0).unwrap();
    }

    let result = m.upsert_at(NotifyParams::new("overflow").replacing(99), 0);
    assert!(matches!(result, Err(NotifyError::CapacityReached { limit: 5 })));
    assert_eq!(m.store().len(), 5);
    assert_eq!(m.platform().surface_count(), 5);

    let reply = handle_call(&mut m, ServiceCall::Notify(NotifyRequest::new("overflow")));
    assert!(matches!(
        reply,
        ServiceReply::Error {
            kind: ErrorKind::Capacity,
            ..
        }
    ));
    assert_eq!(m.store().len(), 5);
}

#[test]
fn test_full_store_still_accepts_replacement() {
    let mut m = manager();
    for i in 0..5 {
        m.upsert_at(NotifyParams::new(format!("n{i}")), 0).unwrap();
    }

    let replaced = m.upsert_at(NotifyParams::new("again").replacing(3), 1).unwrap();
    assert_eq!(replaced, id(3));
    assert_eq!(m.store().get(id(3)).unwrap().summary(), "again");
}

#[test]
fn test_replace_key_keeps_id_and_position() {
    let mut m = manager();
    m.upsert_at(NotifyParams::new("Other"), 0).unwrap();
    let deploy = m
        .upsert_at(NotifyParams::new("Deploy").replacing(42).expire_after(1000), 0)
        .unwrap();
    let surface = surface_of(&m, deploy);

    let again = m
        .upsert_at(NotifyParams::new("Deploy").with_body("done").replacing(42), 500)
        .unwrap();

    assert_eq!(again, deploy);
    assert_eq!(m.store().len(), 2);

    let n = m.store().get(deploy).unwrap();
    assert_eq!(n.position_index(), 1);
    assert_eq!(n.surface(), surface);
    assert_eq!(n.body(), Some("done"));
    assert_eq!(n.expire_after(), None);
    assert_eq!(n.created_at(), 500);
}

#[test]
fn test_zero_key_always_creates() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("same"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("same"), 0).unwrap();
    assert_ne!(a, b);
    assert_eq!(m.store().len(), 2);
}

#[test]
fn test_blank_summary_leaves_store_untouched() {
    let mut m = manager();
    m.upsert_at(NotifyParams::new("kept"), 0).unwrap();

    let result = m.upsert_at(NotifyParams::new("  "), 0);
    assert!(matches!(result, Err(NotifyError::InvalidRequest(_))));

    let reply = handle_call(&mut m, ServiceCall::Notify(NotifyRequest::default()));
    assert!(matches!(
        reply,
        ServiceReply::Error {
            kind: ErrorKind::InvalidRequest,
            ..
        }
    ));
    assert_eq!(m.store().len(), 1);
}

// =============================================================================
// Sizing
// =============================================================================

#[test]
fn test_dimensions_are_pure_function_of_text() {
    let config = NotifydConfig::default();
    let sizing = SizingEngine::new(&config.appearance, &config.layout);
    let text = text();

    let body = "A somewhat longer body that certainly needs to wrap at least once";
    let first = sizing.compute_dimensions(&text, "Build", Some(body));
    let second = sizing.compute_dimensions(&text, "Build", Some(body));
    assert_eq!(first, second);

    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("Build").with_body(body), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("Build").with_body(body), 0).unwrap();
    assert_eq!(
        m.store().get(a).unwrap().dimensions(),
        m.store().get(b).unwrap().dimensions()
    );
    assert_eq!(m.store().get(a).unwrap().dimensions(), first);
}

#[test]
fn test_dimensions_respect_bounds() {
    let mut m = manager();
    let short = m.upsert_at(NotifyParams::new("x"), 0).unwrap();
    assert_eq!(m.store().get(short).unwrap().dimensions(), (300, 50));

    // 17px lines: summary + body + padding + 2 * padding
    let two = m.upsert_at(NotifyParams::new("Build").with_body("Running"), 0).unwrap();
    assert_eq!(m.store().get(two).unwrap().dimensions(), (300, 79));
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn test_expiry_fires_at_timeout() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("t").expire_after(5000), 0).unwrap();

    assert!(m.tick(4999).is_empty());
    assert!(m.store().get(n).is_some());

    assert_eq!(m.tick(5000), vec![n]);
    assert!(m.store().get(n).is_none());
    assert_eq!(m.platform().surface_count(), 0);
}

#[test]
fn test_default_duration_applies() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("t"), 100).unwrap();

    assert!(m.tick(3099).is_empty());
    assert_eq!(m.tick(3100), vec![n]);
}

#[test]
fn test_never_expire() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("sticky").expire_after(0), 0).unwrap();

    for step in 0..1000u64 {
        m.tick(step * 1_000_000);
    }
    assert!(m.store().get(n).is_some());
    assert!((m.store().get(n).unwrap().opacity() - 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_adjacent_expiries_in_one_tick() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("a").expire_after(100), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("b").expire_after(100), 0).unwrap();
    let c = m.upsert_at(NotifyParams::new("c").expire_after(0), 0).unwrap();

    assert_eq!(m.tick(100), vec![a, b]);
    assert_eq!(m.store().ids(), vec![c]);
    assert_eq!(m.store().get(c).unwrap().position_index(), 0);
}

#[test]
fn test_replace_resets_expiry_clock() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("t").expire_after(1000), 0).unwrap();
    m.upsert_at(NotifyParams::new("t2").expire_after(1000).replacing(n.as_u32()), 900)
        .unwrap();

    assert!(m.tick(1500).is_empty());
    assert_eq!(m.tick(1900), vec![n]);
}

#[test]
fn test_fade_lowers_opacity_without_moving_expiry() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("t").expire_after(1000), 0).unwrap();
    pump(&mut m);

    m.tick(700);
    assert!((m.store().get(n).unwrap().opacity() - 1.0).abs() < f32::EPSILON);

    m.tick(900);
    assert!((m.store().get(n).unwrap().opacity() - 0.5).abs() < f32::EPSILON);

    assert!(m.tick(999).is_empty());
    assert_eq!(m.tick(1000), vec![n]);
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn test_stack_offsets_accumulate_true_heights() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m
        .upsert_at(NotifyParams::new("B").with_body("one\ntwo\nthree"), 0)
        .unwrap();
    let c = m.upsert_at(NotifyParams::new("C").with_body("x"), 0).unwrap();

    let h0 = m.store().get(a).unwrap().dimensions().1 as i32;
    let h1 = m.store().get(b).unwrap().dimensions().1 as i32;
    assert_ne!(h0, h1);

    assert_eq!(top_margin(&m, a), SPACING);
    assert_eq!(top_margin(&m, b), SPACING + h0 + SPACING);
    assert_eq!(top_margin(&m, c), SPACING + h0 + SPACING + h1 + SPACING);

    let surface = m.platform().surface(surface_of(&m, c)).unwrap();
    assert_eq!(surface.anchor(), Anchor::TOP | Anchor::RIGHT);
    assert_eq!(surface.margins().right, SPACING);
    assert_eq!(surface.exclusive_zone(), -1);
    assert_eq!(surface.namespace(), "notifyd");
}

#[test]
fn test_restack_after_removing_middle() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m
        .upsert_at(NotifyParams::new("B").with_body("one\ntwo\nthree"), 0)
        .unwrap();
    let c = m.upsert_at(NotifyParams::new("C").with_body("x"), 0).unwrap();
    let h0 = m.store().get(a).unwrap().dimensions().1 as i32;

    let removed = m.remove_at(1, CloseReason::Dismissed).unwrap();
    assert_eq!(removed.id(), b);

    assert_eq!(m.store().ids(), vec![a, c]);
    assert_eq!(m.store().get(a).unwrap().position_index(), 0);
    assert_eq!(m.store().get(c).unwrap().position_index(), 1);

    assert_eq!(top_margin(&m, a), SPACING);
    assert_eq!(top_margin(&m, c), SPACING + h0 + SPACING);
    assert_eq!(m.placements()[1].edge_margin(), SPACING + h0 + SPACING);
    assert_eq!(m.platform().surface_count(), 2);
}

#[test]
fn test_bottom_center_placement() {
    let mut config = NotifydConfig::default();
    config.layout.edge = "bottom".parse().unwrap();
    config.layout.alignment = "center".parse().unwrap();
    let mut m = manager_with(config);

    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("B"), 0).unwrap();

    let surface = m.platform().surface(surface_of(&m, b)).unwrap();
    assert_eq!(surface.anchor(), Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT);
    assert_eq!(surface.margins().bottom, SPACING + 50 + SPACING);
    assert_eq!(surface.margins().top, 0);
    assert_eq!(surface.margins().left, 0);
    assert_eq!(surface.margins().right, 0);

    let first = m.platform().surface(surface_of(&m, a)).unwrap();
    assert_eq!(first.margins().bottom, SPACING);
}

#[test]
fn test_resize_on_replace_restacks_later_entries() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("B"), 0).unwrap();
    pump(&mut m);
    assert_eq!(top_margin(&m, b), SPACING + 50 + SPACING);

    m.upsert_at(NotifyParams::new("A").with_body("grown").replacing(a.as_u32()), 10)
        .unwrap();
    let grown = m.store().get(a).unwrap().dimensions();
    assert_eq!(grown, (300, 79));
    assert_eq!(top_margin(&m, b), SPACING + 79 + SPACING);

    // The compositor renegotiates the size; the repaint follows it
    pump(&mut m);
    let surface = m.platform().surface(surface_of(&m, a)).unwrap();
    let buffer = m.platform().buffer(surface.attached_buffer().unwrap()).unwrap();
    assert_eq!(buffer.size(), grown);
    assert_eq!(m.store().get(a).unwrap().position_index(), 0);
}

// =============================================================================
// Platform events
// =============================================================================

#[test]
fn test_first_configure_paints_and_publishes() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("Build").with_body("Running"), 0).unwrap();
    assert!(!m.store().get(n).unwrap().is_configured());
    assert_eq!(m.platform().buffer_count(), 0);

    pump(&mut m);

    let entry = m.store().get(n).unwrap();
    assert!(entry.is_configured());
    assert_eq!(entry.buffers_in_flight().len(), 1);

    let surface = m.platform().surface(entry.surface()).unwrap();
    assert!(surface.is_acked());
    let buffer = m.platform().buffer(surface.attached_buffer().unwrap()).unwrap();
    assert_eq!(buffer.size(), (300, 79));
    assert_eq!(buffer.stride(), 300 * 4);

    // Border pixel, BGRA: #005577 fully opaque
    assert_eq!(buffer.pixel(0, 40), Some([0x77, 0x55, 0x00, 0xff]));
}

#[test]
fn test_released_buffers_are_destroyed() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("Build").with_body("Running"), 0).unwrap();
    pump(&mut m);

    // Same size: repainted in place with a new buffer
    m.upsert_at(NotifyParams::new("Build").with_body("Failed").replacing(1), 5)
        .unwrap();
    assert_eq!(m.store().get(n).unwrap().buffers_in_flight().len(), 2);

    pump(&mut m);
    assert_eq!(m.store().get(n).unwrap().buffers_in_flight().len(), 1);
    assert_eq!(m.platform().buffer_count(), 1);
}

#[test]
fn test_compositor_close_removes_entry() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("B"), 0).unwrap();
    pump(&mut m);

    let surface = surface_of(&m, a);
    m.platform_mut().close(surface);
    pump(&mut m);

    assert_eq!(m.store().ids(), vec![b]);
    assert!(m.platform().surface(surface).is_none());
    assert_eq!(top_margin(&m, b), SPACING);
    assert_eq!(m.platform().buffer_count(), 1);
}

#[test]
fn test_close_by_id() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    pump(&mut m);

    m.close(n).unwrap();
    assert!(m.store().is_empty());
    assert_eq!(m.platform().surface_count(), 0);
    assert_eq!(m.platform().buffer_count(), 0);

    assert!(matches!(m.close(n), Err(NotifyError::UnknownNotification(_))));

    let reply = handle_call(&mut m, ServiceCall::CloseNotification { id: n.as_u32() });
    assert!(matches!(
        reply,
        ServiceReply::Error {
            kind: ErrorKind::UnknownNotification,
            ..
        }
    ));
}

#[test]
fn test_allocation_failure_leaves_store_consistent() {
    let mut m = manager();
    m.platform_mut().set_fail_allocations(true);

    let result = m.upsert_at(NotifyParams::new("A"), 0);
    assert!(matches!(result, Err(NotifyError::Platform(_))));
    assert!(m.store().is_empty());

    m.platform_mut().set_fail_allocations(false);
    let n = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    assert_eq!(n, id(1));
}

#[test]
fn test_failed_publish_keeps_entry() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("A"), 0).unwrap();

    m.platform_mut().set_fail_allocations(true);
    pump(&mut m);

    let entry = m.store().get(n).unwrap();
    assert!(entry.is_configured());
    assert!(entry.buffers_in_flight().is_empty());
    assert_eq!(m.store().len(), 1);
}

#[test]
fn test_failed_replace_keeps_prior_content_and_stack() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("B"), 0).unwrap();
    pump(&mut m);
    assert_eq!(top_margin(&m, b), SPACING + 50 + SPACING);

    m.platform_mut().set_fail_allocations(true);
    let long_body = "a much longer body that wraps onto several lines ".repeat(3);
    let result = m.upsert_at(
        NotifyParams::new("A2").with_body(long_body.clone()).replacing(a.as_u32()),
        100,
    );
    assert!(matches!(result, Err(NotifyError::Render(_))));

    let entry = m.store().get(a).unwrap();
    assert_eq!(entry.dimensions(), (300, 50));
    assert_eq!(entry.summary(), "A");
    assert_eq!(entry.body(), None);
    assert_eq!(entry.created_at(), 0);
    assert_eq!(top_margin(&m, b), SPACING + 50 + SPACING);

    let surface = m.platform().surface(entry.surface()).unwrap();
    let shown = m.platform().buffer(surface.attached_buffer().unwrap()).unwrap();
    assert_eq!(shown.size(), entry.dimensions());
    pump(&mut m);
    assert_eq!(m.store().get(a).unwrap().dimensions(), (300, 50));

    // Once allocations recover the same replacement goes through
    m.platform_mut().set_fail_allocations(false);
    let replaced = m
        .upsert_at(NotifyParams::new("A2").with_body(long_body).replacing(a.as_u32()), 200)
        .unwrap();
    assert_eq!(replaced, a);
    let (_, grown) = m.store().get(a).unwrap().dimensions();
    assert!(grown > 50);
    assert_eq!(top_margin(&m, b), SPACING + grown as i32 + SPACING);
}

#[test]
fn test_failed_replace_is_reported_to_caller() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    pump(&mut m);

    m.platform_mut().set_fail_allocations(true);
    let reply = handle_call(
        &mut m,
        ServiceCall::Notify(NotifyRequest {
            replaces_id: a.as_u32(),
            body: Some("changed".to_string()),
            ..NotifyRequest::new("A")
        }),
    );
    assert!(matches!(
        reply,
        ServiceReply::Error {
            kind: ErrorKind::Render,
            ..
        }
    ));
    assert_eq!(m.store().get(a).unwrap().body(), None);
}

#[test]
fn test_replace_records_newest_key() {
    let mut m = manager();
    let n = m.upsert_at(NotifyParams::new("A").replacing(42), 0).unwrap();
    assert_eq!(n, id(1));
    assert_eq!(m.store().get(n).unwrap().replace_key(), 42);

    m.upsert_at(NotifyParams::new("A2").replacing(n.as_u32()), 5).unwrap();
    assert_eq!(m.store().get(n).unwrap().replace_key(), n.as_u32());

    // The key it was created under no longer targets it
    let fresh = m.upsert_at(NotifyParams::new("B").replacing(42), 6).unwrap();
    assert_eq!(fresh, id(2));
    assert_eq!(m.store().len(), 2);
}

#[test]
fn test_destroy_releases_everything() {
    let mut m = manager();
    m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    m.upsert_at(NotifyParams::new("B"), 0).unwrap();
    pump(&mut m);

    let platform = m.destroy();
    assert_eq!(platform.surface_count(), 0);
    assert_eq!(platform.buffer_count(), 0);
}

#[test]
fn test_ids_are_not_reused_while_live() {
    let mut m = manager();
    let a = m.upsert_at(NotifyParams::new("A"), 0).unwrap();
    let b = m.upsert_at(NotifyParams::new("B"), 0).unwrap();
    m.close(a).unwrap();
    let c = m.upsert_at(NotifyParams::new("C"), 0).unwrap();

    assert_eq!(b, id(2));
    assert_eq!(c, id(3));
}
