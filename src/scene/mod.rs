pub mod camera;
pub mod environment;
pub mod frustum;
pub mod light;

pub use camera::Camera;
pub use environment::{Environment, HillaireSky, PreethamSky, SkyModel};
pub use frustum::{Frustum, Plane, intersects};
pub use light::{
    DirectionalLight, DirectionalLightRecord, Light, LightKind, PointLight, PointLightRecord, SpotLight,
    SpotLightRecord,
};
