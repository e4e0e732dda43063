//! prisma renderer - CPU path tracing and photon mapping
//!
//! An offline, physically based Monte Carlo renderer. Scenes are built
//! programmatically from primitives, materials and lights; images are
//! rendered either by a unidirectional path tracer with multiple importance
//! sampling or by a hybrid photon-mapped integrator.

mod bvh;
mod camera;
mod cone;
mod disk;
mod hittable;
mod integrator;
mod light;
mod material;
mod medium;
mod mesh;
mod output;
mod photon_integrator;
mod photon_map;
mod renderer;
mod scene;
mod sphere;
mod triangle;

pub use bvh::BvhNode;
pub use camera::Camera;
pub use cone::Cone;
pub use disk::Disk;
pub use hittable::{HitRecord, Hittable, SurfaceSample};
pub use integrator::{Integrator, PathIntegrator};
pub use light::{
    DiffuseAreaLight, EnvironmentLight, Light, LightSample, PhotonEmission, PointLight,
};
pub use material::{
    Color, Dielectric, DiffuseLight, DispersiveGlass, Isotropic, Lambertian, Material, Metal,
    ScatterRecord,
};
pub use medium::ConstantMedium;
pub use mesh::{Mesh, MeshError, MeshTransform, MovingMesh};
pub use output::{heatmap_to_rgb8, tonemap_to_rgb8, write_png};
pub use photon_integrator::{PhotonIntegrator, PhotonMappingConfig};
pub use photon_map::{NearPhoton, Photon, PhotonMap};
pub use renderer::{RenderConfig, RenderResult, Renderer};
pub use scene::Scene;
pub use sphere::{MovingSphere, Sphere};
pub use triangle::Triangle;

/// Re-export common math types.
pub use prisma_math::{Aabb, Interval, Onb, Ray, Vec3};
