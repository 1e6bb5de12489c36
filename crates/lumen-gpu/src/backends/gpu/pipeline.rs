use std::collections::HashMap;

use crate::protocol::{PathVertex, QuadVertex, ShaderType, VertexBufferFormat};

use super::uniform::StateUniform;

/// Render target format of every render buffer.
pub(super) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── vertex layouts ────────────────────────────────────────────────────────

const PATH_ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x2, // pos
    1 => Unorm8x4,  // color
    2 => Float32x2  // obj
];

const QUAD_ATTRS: [wgpu::VertexAttribute; 11] = wgpu::vertex_attr_array![
    0 => Float32x2,  // pos
    1 => Unorm8x4,   // color
    2 => Float32x2,  // tex
    3 => Float32x2,  // obj
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4,
    7 => Float32x4,
    8 => Float32x4,
    9 => Float32x4,
    10 => Float32x4
];

pub(super) fn vertex_layout(format: VertexBufferFormat) -> wgpu::VertexBufferLayout<'static> {
    match format {
        VertexBufferFormat::Path => wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PathVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &PATH_ATTRS,
        },
        VertexBufferFormat::Quad => wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRS,
        },
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

/// Pipeline selector: vertex layout, fragment shader, blending.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub format: VertexBufferFormat,
    pub shader: ShaderType,
    pub blend: bool,
}

/// Shader module, layouts and lazily built pipelines.
pub(super) struct Pipelines {
    shader: wgpu::ShaderModule,
    pub state_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen protocol shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/protocol.wgsl").into()),
        });

        let state_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen state bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<StateUniform>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen texture bgl"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen pipeline layout"),
            bind_group_layouts: &[&state_layout, &texture_layout],
            immediate_size: 0,
        });

        Self { shader, state_layout, texture_layout, layout, cache: HashMap::new() }
    }

    pub fn get(&mut self, device: &wgpu::Device, key: PipelineKey) -> &wgpu::RenderPipeline {
        let Self { shader, layout, cache, .. } = self;
        cache.entry(key).or_insert_with(|| {
            log::debug!("building pipeline {key:?}");
            build(device, shader, layout, key)
        })
    }
}

impl Pipelines {
    /// A pipeline previously built by [`Pipelines::get`].
    pub fn cached(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(key)
    }
}

fn build(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let vs = match key.format {
        VertexBufferFormat::Path => "vs_path",
        VertexBufferFormat::Quad => "vs_quad",
    };
    let fs = match key.shader {
        ShaderType::Fill => "fs_fill",
        ShaderType::FillPath => "fs_path",
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lumen protocol pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs),
            compilation_options: Default::default(),
            buffers: &[vertex_layout(key.format)],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: key.blend.then(premul_alpha_blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_cover_the_whole_stride() {
        for format in [VertexBufferFormat::Path, VertexBufferFormat::Quad] {
            let layout = vertex_layout(format);
            assert_eq!(layout.array_stride as usize, format.stride());
            let end = layout.attributes.iter().map(|a| a.offset + a.format.size()).max().unwrap();
            assert_eq!(end, layout.array_stride);
        }
    }

    #[test]
    fn quad_attribute_offsets_match_struct() {
        let offsets: Vec<u64> = QUAD_ATTRS.iter().map(|a| a.offset).collect();
        assert_eq!(offsets[..4], [0, 8, 12, 20]);
        assert_eq!(offsets[4], std::mem::offset_of!(QuadVertex, data) as u64);
    }
}
