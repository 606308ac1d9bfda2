//! Pipeline stages, in execution order.
//!
//! Each stage takes the previous stage's output by value or reference, so the
//! frame ordering is visible in the types: the shadow pass needs a
//! [`CascadeSet`](cascades::CascadeSet), lighting needs
//! [`GeometryOutput`](geometry::GeometryOutput) and
//! [`ShadowMaps`](shadow::ShadowMaps), and so on.

pub mod bloom;
pub mod cascades;
pub mod geometry;
pub mod lighting;
pub mod post_process;
pub mod shadow;

pub use bloom::BloomOutput;
pub use cascades::{Cascade, CascadeSet};
pub use geometry::GeometryOutput;
pub use lighting::LightingOutput;
pub use shadow::ShadowMaps;
