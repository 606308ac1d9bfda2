//! Bloom Pipeline
//!
//! A compute-only mip pyramid built from the HDR lighting buffer:
//!
//! ```text
//! lighting ──prefilter──▶ down[0] ──▶ down[1] ──▶ … ──▶ down[M-1]
//!                            │           │                  │
//!                          blur        blur               blur
//!                            ▼           ▼                  ▼
//!                         buffer[0]   buffer[1]   …      up[M-1]
//!                            │           │                  │
//!              up[0] ◀──blend── up[1] ◀──blend── … ◀────────┘
//! ```
//!
//! Each blend step adds the coarser upsampled mip (tent filtered) to the
//! blurred downsample of the current level. Every dispatch covers its
//! destination in 32x32 groups and is followed by a full memory barrier,
//! since each stage reads what the previous one wrote.

use glam::Vec4;

use super::lighting::LightingOutput;
use crate::renderer::device::{ComputeDispatch, ComputeProgram, ImageRef, MemoryBarrier, RenderDevice};
use crate::renderer::settings::BloomSettings;
use crate::renderer::targets::BloomChain;
use crate::renderer::uniforms::BloomUniforms;

/// Work-group edge for every bloom kernel.
pub const BLOOM_GROUP_SIZE: u32 = 32;

#[derive(Debug, Clone, Copy)]
pub struct BloomOutput {
    /// Finest upsample mip.
    pub image: ImageRef,
    pub intensity: f32,
}

fn submit<D: RenderDevice>(device: &mut D, chain: &BloomChain, program: ComputeProgram<'_>) {
    let (width, height) = chain.mip_size(program.writes().mip);
    device.dispatch(&ComputeDispatch::covering(program, width, height, BLOOM_GROUP_SIZE));
    device.memory_barrier(MemoryBarrier::ALL);
}

/// Runs the pyramid; `None` when bloom is disabled.
pub fn run<D: RenderDevice>(
    device: &mut D,
    chain: &BloomChain,
    lighting: &LightingOutput,
    settings: &BloomSettings,
) -> Option<BloomOutput> {
    if !settings.enabled {
        return None;
    }

    let uniforms = BloomUniforms {
        curve: Vec4::from_array(settings.curve()),
        radius: Vec4::new(settings.radius, 0.0, 0.0, 0.0),
    };
    let mips = chain.mip_count();
    let down = |mip| ImageRef::color(chain.downsample, 0).mip(mip);
    let buffer = |mip| ImageRef::color(chain.buffer, 0).mip(mip);
    let up = |mip| ImageRef::color(chain.upsample, 0).mip(mip);

    submit(
        device,
        chain,
        ComputeProgram::BloomPrefilter {
            source: lighting.hdr,
            dest: down(0),
            uniforms,
        },
    );

    for mip in 1..mips {
        submit(
            device,
            chain,
            ComputeProgram::BloomDownsample {
                source: down(mip - 1),
                dest: down(mip),
            },
        );
    }

    for mip in 0..mips - 1 {
        submit(
            device,
            chain,
            ComputeProgram::BloomUpsample {
                source: down(mip),
                dest: buffer(mip),
                uniforms,
            },
        );
    }

    submit(
        device,
        chain,
        ComputeProgram::BloomUpsample {
            source: down(mips - 1),
            dest: up(mips - 1),
            uniforms,
        },
    );

    for mip in (1..mips).rev() {
        submit(
            device,
            chain,
            ComputeProgram::BloomUpsampleBlend {
                previous: up(mip),
                current: buffer(mip - 1),
                dest: up(mip - 1),
                uniforms,
            },
        );
    }

    Some(BloomOutput {
        image: up(0),
        intensity: settings.intensity,
    })
}
