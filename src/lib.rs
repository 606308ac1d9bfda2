#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod software;

pub use errors::{RenderError, Result};
pub use renderer::{Renderer, RendererSettings, RendererStatistics};
pub use resources::{AnimationPose, AxisAlignedBox, MaterialTable, MeshData, Model, Submesh, create_box};
pub use scene::{Camera, Environment, Frustum, Light, SkyModel};
pub use software::{MaterialParams, SoftwareDevice};
