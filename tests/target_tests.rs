//! Render Target Tests
//!
//! Tests for:
//! - TargetPool: configuration resolved once at construction, unsupported
//!   descriptors failing before anything is pooled
//! - TargetFrame: draw/wait lifecycle, a new draw blocking out the previous
//!   in-flight one
//! - TargetLease: drop waits out in-flight work before re-pooling

use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::smallvec;
use vidmix_core::{
    ConfigCache, GpuBackend, ImageLayout, NullBackend, QueueKind, RenderConfigDescriptor,
    TargetPool, VidmixError,
};

fn pool_with(
    backend: &Arc<NullBackend>,
    descriptor: RenderConfigDescriptor,
) -> TargetPool<NullBackend> {
    let cache = ConfigCache::new(Arc::clone(backend));
    TargetPool::new(Arc::clone(backend), 64, 64, descriptor, &cache).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn pool_resolves_configuration_once() {
    let backend = Arc::new(NullBackend::new());
    let cache = ConfigCache::new(Arc::clone(&backend));
    let desc = RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm);

    let a = TargetPool::new(Arc::clone(&backend), 64, 64, desc.clone(), &cache).unwrap();
    let b = TargetPool::new(Arc::clone(&backend), 128, 128, desc, &cache).unwrap();

    // Extent does not participate: both pools share the cached configuration.
    assert!(Arc::ptr_eq(a.render_config(), b.render_config()));
    assert_eq!(backend.stats().render_configs, 1);
}

#[test]
fn unsupported_descriptor_fails_before_pooling() {
    let backend = Arc::new(NullBackend::new());
    let cache = ConfigCache::new(Arc::clone(&backend));
    let empty = RenderConfigDescriptor {
        color_formats: smallvec![],
        aux_format: None,
        final_layout: ImageLayout::ShaderRead,
    };

    let result = TargetPool::new(Arc::clone(&backend), 64, 64, empty, &cache);
    assert!(matches!(result, Err(VidmixError::UnsupportedConfig(_))));
    assert_eq!(backend.stats().device_images, 0, "nothing was allocated");
}

#[test]
fn acquired_frame_has_configured_attachments() {
    let backend = Arc::new(NullBackend::new());
    let desc = RenderConfigDescriptor {
        color_formats: smallvec![
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::R8Unorm
        ],
        aux_format: Some(wgpu::TextureFormat::R16Float),
        final_layout: ImageLayout::ShaderRead,
    };
    let pool = pool_with(&backend, desc);

    let frame = pool.acquire_frame().unwrap();
    assert!(frame.color_image(0).is_ok());
    assert!(frame.color_image(1).is_ok());
    assert!(frame.color_image(2).is_err());
    let aux = frame.aux_image().unwrap();
    assert_eq!(aux.usage(), wgpu::TextureUsages::RENDER_ATTACHMENT);
    assert_eq!(
        frame.color_image(0).unwrap().usage(),
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
    );
}

// ============================================================================
// Draw lifecycle
// ============================================================================

#[test]
fn draw_submits_to_graphics_queue() {
    let backend = Arc::new(NullBackend::new());
    let pool = pool_with(
        &backend,
        RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm),
    );

    let mut frame = pool.acquire_frame().unwrap();
    let mut commands = backend.create_commands(QueueKind::Graphics).unwrap();
    frame.draw(&mut commands).unwrap();

    // Auto-completing backend: the render is already done.
    assert!(frame.wait_completion(Some(Duration::ZERO)).unwrap());
    assert_eq!(backend.stats().submissions, 1);
}

#[test]
fn draw_rejects_commands_recorded_for_another_queue() {
    let backend = Arc::new(NullBackend::new());
    let pool = pool_with(
        &backend,
        RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm),
    );

    let mut frame = pool.acquire_frame().unwrap();
    let mut commands = backend.create_commands(QueueKind::Transfer).unwrap();
    assert!(matches!(
        frame.draw(&mut commands),
        Err(VidmixError::SubmissionFailed(_))
    ));
    assert!(!frame.is_in_flight(), "failed submission leaves the frame idle");
}

#[test]
fn second_draw_blocks_until_first_completes() {
    let backend = Arc::new(NullBackend::new().manual_completion());
    let pool = pool_with(
        &backend,
        RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm),
    );

    let mut frame = pool.acquire_frame().unwrap();
    let mut commands = backend.create_commands(QueueKind::Graphics).unwrap();
    frame.draw(&mut commands).unwrap();
    assert!(frame.is_in_flight());

    let completer = {
        let backend = Arc::clone(&backend);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            backend.complete_pending()
        })
    };

    // The second draw must not stomp on the in-flight render.
    let start = Instant::now();
    let mut commands = backend.create_commands(QueueKind::Graphics).unwrap();
    frame.draw(&mut commands).unwrap();
    assert!(
        start.elapsed() >= Duration::from_millis(40),
        "second draw waited for the first"
    );
    assert_eq!(completer.join().unwrap(), 1);

    // Settle the second submission before the lease drops.
    assert_eq!(backend.complete_pending(), 1);
    assert!(frame.wait_completion(None).unwrap());
}

// ============================================================================
// Pooling
// ============================================================================

#[test]
fn dropped_lease_returns_target_to_pool() {
    let backend = Arc::new(NullBackend::new());
    let pool = pool_with(
        &backend,
        RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm),
    );

    let frame = pool.acquire_frame().unwrap();
    drop(frame);
    assert_eq!(pool.spare_count(), 1);

    let _frame = pool.acquire_frame().unwrap();
    assert_eq!(
        backend.stats().device_images,
        1,
        "second acquisition reuses the pooled target"
    );
}

#[test]
fn lease_drop_waits_out_in_flight_render() {
    let backend = Arc::new(NullBackend::new().manual_completion());
    let pool = pool_with(
        &backend,
        RenderConfigDescriptor::single(wgpu::TextureFormat::Rgba8Unorm),
    );

    let mut frame = pool.acquire_frame().unwrap();
    let mut commands = backend.create_commands(QueueKind::Graphics).unwrap();
    frame.draw(&mut commands).unwrap();

    let completer = {
        let backend = Arc::clone(&backend);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            backend.complete_pending()
        })
    };

    let start = Instant::now();
    drop(frame);
    assert!(
        start.elapsed() >= Duration::from_millis(40),
        "release blocked until the render finished"
    );
    assert_eq!(completer.join().unwrap(), 1);
    assert_eq!(pool.spare_count(), 1);
}
