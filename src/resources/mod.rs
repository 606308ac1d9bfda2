pub mod bounds;
pub mod mesh;
pub mod model;

pub use bounds::AxisAlignedBox;
pub use mesh::{MeshData, create_box};
pub use model::{AnimationPose, MaterialHandle, MaterialTable, MeshHandle, Model, Submesh, TextureHandle};
