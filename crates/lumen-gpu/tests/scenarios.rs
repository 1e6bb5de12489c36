//! End-to-end driver sessions against the reference backends.

use lumen_gpu::backends::{NullDriver, RecordedCall, RecordingDriver, SoftwareDriver, ValidatingDriver};
use lumen_gpu::bitmap::Bitmap;
use lumen_gpu::protocol::{
    synchronize, Command, CommandList, DriverConfig, GpuDriver, GpuState, IndexBuffer, IndexType,
    ProtocolError, QuadVertex, RenderBufferDesc, VertexBuffer, ViolationPolicy,
};

const RED: [u8; 4] = [0, 0, 255, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

fn all_pixels(bitmap: &Bitmap, bgra: [u8; 4]) -> bool {
    (0..bitmap.height()).all(|y| (0..bitmap.width()).all(|x| bitmap.pixel(x, y) == Some(&bgra[..])))
}

fn quad(w: f32, h: f32, rgba: [u8; 4]) -> [QuadVertex; 4] {
    [
        QuadVertex::new([0.0, 0.0], rgba, [0.0, 0.0]),
        QuadVertex::new([w, 0.0], rgba, [1.0, 0.0]),
        QuadVertex::new([w, h], rgba, [1.0, 1.0]),
        QuadVertex::new([0.0, h], rgba, [0.0, 1.0]),
    ]
}

const QUAD_INDICES: [IndexType; 6] = [0, 1, 2, 0, 2, 3];

// ── render buffer over a pixel texture ────────────────────────────────────

#[test]
fn render_buffer_shares_its_texture_then_clears() {
    let mut driver = SoftwareDriver::new(&DriverConfig::default());

    let rb = {
        let mut pass = synchronize(&mut driver);
        let tex = pass.create_texture(&Bitmap::solid_bgra(4, 4, RED));
        assert_eq!(tex.get(), 1);
        let rb = pass.create_render_buffer(tex, 4, 4);
        assert_eq!(rb.get(), 1);
        rb
    };

    let before = driver.read_render_buffer(rb).unwrap();
    assert!(all_pixels(&before, RED));

    {
        let mut pass = synchronize(&mut driver);
        let mut list = CommandList::new();
        list.clear_render_buffer(GpuState::new(rb, 4, 4));
        pass.update_command_list(&list);
    }
    let stats = driver.draw_command_list();
    assert_eq!(stats.clears, 1);

    let after = driver.read_render_buffer(rb).unwrap();
    assert!(all_pixels(&after, TRANSPARENT));
    assert!(driver.violations().is_empty());
}

// ── indexed quad draw ─────────────────────────────────────────────────────

#[test]
fn quad_geometry_issues_one_indexed_draw() {
    let vertices = quad(4.0, 4.0, [0, 255, 0, 255]);
    let vb = VertexBuffer::from_quad_vertices(&vertices);
    let ib = IndexBuffer::from_indices(&QUAD_INDICES);
    assert_eq!(vb.data.len(), 4 * 140);
    assert_eq!(ib.data.len(), 24);

    let mut driver = RecordingDriver::wrap(SoftwareDriver::new(&DriverConfig::default()));
    let rb = {
        let mut pass = synchronize(&mut driver);
        let target = pass.create_render_target();
        let rb = pass.create_render_buffer(target, 4, 4);
        let geometry = pass.create_geometry(vb, ib);
        assert_eq!(geometry.get(), 1);

        let mut list = CommandList::new();
        list.clear_render_buffer(GpuState::new(rb, 4, 4));
        list.draw_geometry(GpuState::new(rb, 4, 4), geometry, 6, 0);
        pass.update_command_list(&list);
        rb
    };

    let published: Vec<_> = driver
        .trace()
        .calls()
        .iter()
        .filter_map(|c| match c {
            RecordedCall::UpdateCommandList(list) => Some(list.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(published.len(), 1);
    let draws: Vec<_> = published[0]
        .iter()
        .filter_map(|c| match c {
            Command::DrawGeometry { indices_count, indices_offset, .. } => Some((*indices_count, *indices_offset)),
            _ => None,
        })
        .collect();
    assert_eq!(draws, [(6, 0)]);

    let stats = driver.inner_mut().draw_command_list();
    assert_eq!((stats.draws, stats.indices), (1, 6));
    let pixels = driver.inner().read_render_buffer(rb).unwrap();
    assert!(all_pixels(&pixels, GREEN));
}

// ── render targets refuse pixel uploads ───────────────────────────────────

#[test]
fn render_target_update_is_skipped_when_lenient() {
    let mut driver = SoftwareDriver::new(&DriverConfig::lenient());
    let target = {
        let mut pass = synchronize(&mut driver);
        let target = pass.create_render_target();
        pass.create_render_buffer(target, 2, 2);
        pass.update_texture(target, &Bitmap::solid_bgra(2, 2, RED));
        target
    };

    assert_eq!(
        driver.violations().last(),
        Some(&ProtocolError::RenderTargetUpdate { id: target.get() })
    );
    let pixels = driver.read_texture(target).unwrap();
    assert!(!all_pixels(&pixels, RED));
}

#[test]
fn render_target_update_is_dropped_before_the_inner_driver() {
    let mut driver = ValidatingDriver::new(NullDriver::new(), &DriverConfig::lenient());
    {
        let mut pass = synchronize(&mut driver);
        let target = pass.create_render_target();
        pass.update_texture(target, &Bitmap::solid_bgra(1, 1, RED));
    }
    let (inner, monitor) = driver.finish();
    assert_eq!(inner.counts().texture_calls, 1);
    assert_eq!(monitor.violations().total(), 1);
}

#[test]
#[should_panic(expected = "render target")]
fn render_target_update_panics_in_strict_mode() {
    let config = DriverConfig { violation_policy: ViolationPolicy::Panic, ..DriverConfig::default() };
    let mut driver = ValidatingDriver::new(NullDriver::new(), &config);
    driver.begin_synchronize();
    let target = driver.next_texture_id();
    driver.create_texture(target, &Bitmap::empty());
    driver.update_texture(target, &Bitmap::solid_bgra(1, 1, RED));
}

// ── lifetimes ─────────────────────────────────────────────────────────────

#[test]
fn ids_are_never_reused_after_destroy() {
    let mut driver = SoftwareDriver::new(&DriverConfig::default());
    let mut pass = synchronize(&mut driver);
    let a = pass.create_texture(&Bitmap::solid_bgra(1, 1, RED));
    pass.destroy_texture(a);
    let b = pass.create_texture(&Bitmap::solid_bgra(1, 1, RED));
    assert!(b.get() > a.get());
    pass.destroy_texture(b);
}

#[test]
fn render_buffer_keeps_its_texture_storage_alive() {
    let mut driver = SoftwareDriver::new(&DriverConfig::default());
    let rb = {
        let mut pass = synchronize(&mut driver);
        let tex = pass.create_texture(&Bitmap::solid_bgra(2, 2, RED));
        let rb = pass.create_render_buffer(tex, 2, 2);
        pass.destroy_texture(tex);
        rb
    };
    let pixels = driver.read_render_buffer(rb).unwrap();
    assert!(all_pixels(&pixels, RED));
}

#[test]
fn oversized_draw_range_is_rejected() {
    let vertices = quad(2.0, 2.0, [255; 4]);
    let mut driver = ValidatingDriver::new(NullDriver::new(), &DriverConfig::lenient());
    {
        let mut pass = synchronize(&mut driver);
        let target = pass.create_render_target();
        let rb = pass.create_render_buffer(target, 2, 2);
        let geometry = pass.create_geometry(
            VertexBuffer::from_quad_vertices(&vertices),
            IndexBuffer::from_indices(&QUAD_INDICES),
        );
        let mut list = CommandList::new();
        list.draw_geometry(GpuState::new(rb, 2, 2), geometry, 6, 3);
        pass.update_command_list(&list);
    }
    assert!(matches!(
        driver.violations().last(),
        Some(ProtocolError::IndexRange { offset: 3, count: 6, available: 6, .. })
    ));
    assert_eq!(driver.inner().counts().commands, 0);
}

#[test]
fn render_buffer_desc_defaults_have_no_depth_or_stencil() {
    let mut driver = NullDriver::new();
    let tex = driver.next_texture_id();
    let desc = RenderBufferDesc::new(tex, 8, 8);
    assert!(!desc.has_depth_buffer && !desc.has_stencil_buffer);
}
