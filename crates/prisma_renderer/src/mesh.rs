//! Triangle meshes loaded from OBJ files.
//!
//! A mesh owns its triangles and an internal BVH over them. Materials come
//! either from a caller-provided override or from the MTL attributes the
//! decoder yields (diffuse color, diffuse texture, normal texture).

use std::path::Path;
use std::sync::Arc;

use prisma_core::{Distribution1D, ImageTexture, SolidColor, Texture};
use prisma_math::sampling::{random_f32, random_range};
use prisma_math::{Aabb, Interval, Mat3, Mat4, Ray, Vec2, Vec3};
use thiserror::Error;

use crate::bvh::BvhNode;
use crate::hittable::{HitRecord, Hittable, SurfaceSample};
use crate::material::{Lambertian, Material};
use crate::triangle::Triangle;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to parse OBJ: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("mesh has no triangles: {0}")]
    Empty(String),
}

/// Placement parameters applied to every vertex at load time.
#[derive(Debug, Clone, Copy)]
pub struct MeshTransform {
    pub translation: Vec3,
    pub scale: f32,
    pub rotation_axis: Vec3,
    pub rotation_degrees: f32,
}

impl Default for MeshTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: 1.0,
            rotation_axis: Vec3::Y,
            rotation_degrees: 0.0,
        }
    }
}

impl MeshTransform {
    fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_axis_angle(
                self.rotation_axis.normalize(),
                self.rotation_degrees.to_radians(),
            )
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

/// Geometry shared by `Mesh` and `MovingMesh`: triangles, their BVH and the
/// area-weighted triangle distribution.
struct MeshData {
    triangles: Vec<Arc<Triangle>>,
    bvh: BvhNode,
    triangle_distribution: Distribution1D,
    sum_area: f32,
}

impl MeshData {
    fn load(
        path: &Path,
        override_material: Option<Arc<dyn Material>>,
        transform: MeshTransform,
    ) -> Result<Self, MeshError> {
        let options = tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options)?;

        // Materials from the MTL file, unless the caller overrides them.
        let obj_materials: Vec<Arc<dyn Material>> = if override_material.is_none() {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            match materials {
                Ok(list) => list
                    .iter()
                    .map(|m| build_mtl_material(m, base_dir))
                    .collect(),
                Err(err) => {
                    log::warn!("could not load MTL for {}: {err}", path.display());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let fallback: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));

        let matrix = transform.matrix();
        let normal_matrix = Mat3::from_mat4(matrix.inverse().transpose());

        let mut triangles: Vec<Arc<Triangle>> = Vec::new();
        let mut triangle_areas: Vec<f32> = Vec::new();

        for model in &models {
            let mesh = &model.mesh;

            let material: Arc<dyn Material> = match &override_material {
                Some(m) => m.clone(),
                None => match mesh.material_id {
                    Some(id) if id < obj_materials.len() => obj_materials[id].clone(),
                    _ => fallback.clone(),
                },
            };

            // face_arities is empty for all-triangle meshes.
            let arities: Vec<usize> = if mesh.face_arities.is_empty() {
                vec![3; mesh.indices.len() / 3]
            } else {
                mesh.face_arities.iter().map(|&a| a as usize).collect()
            };

            let mut index_offset = 0usize;
            for &arity in &arities {
                // Only triangles are supported; other faces are skipped.
                if arity != 3 {
                    index_offset += arity;
                    continue;
                }

                let mut positions = [Vec3::ZERO; 3];
                let mut normals = [Vec3::ZERO; 3];
                let mut uvs = [Vec2::ZERO; 3];
                let mut has_normals = true;

                for v in 0..3 {
                    let idx = mesh.indices[index_offset + v] as usize;
                    let p = Vec3::new(
                        mesh.positions[3 * idx],
                        mesh.positions[3 * idx + 1],
                        mesh.positions[3 * idx + 2],
                    );
                    positions[v] = matrix.transform_point3(p);

                    if !mesh.normal_indices.is_empty() && !mesh.normals.is_empty() {
                        let nidx = mesh.normal_indices[index_offset + v] as usize;
                        let n = Vec3::new(
                            mesh.normals[3 * nidx],
                            mesh.normals[3 * nidx + 1],
                            mesh.normals[3 * nidx + 2],
                        );
                        normals[v] = (normal_matrix * n).normalize();
                    } else {
                        has_normals = false;
                    }

                    if !mesh.texcoord_indices.is_empty() && !mesh.texcoords.is_empty() {
                        let tidx = mesh.texcoord_indices[index_offset + v] as usize;
                        uvs[v] = Vec2::new(mesh.texcoords[2 * tidx], mesh.texcoords[2 * tidx + 1]);
                    }
                }

                // Faces missing normals fall back to flat shading.
                let triangle = if has_normals {
                    Triangle::smooth(
                        positions[0],
                        positions[1],
                        positions[2],
                        normals[0],
                        normals[1],
                        normals[2],
                        material.clone(),
                        uvs[0],
                        uvs[1],
                        uvs[2],
                    )
                } else {
                    Triangle::with_uvs(
                        positions[0],
                        positions[1],
                        positions[2],
                        material.clone(),
                        uvs[0],
                        uvs[1],
                        uvs[2],
                    )
                };

                triangle_areas.push(triangle.area());
                triangles.push(Arc::new(triangle));
                index_offset += 3;
            }
        }

        if triangles.is_empty() {
            return Err(MeshError::Empty(path.display().to_string()));
        }

        log::info!(
            "loaded mesh {}: {} triangles",
            path.display(),
            triangles.len()
        );

        let shared: Vec<Arc<dyn Hittable>> = triangles
            .iter()
            .map(|t| t.clone() as Arc<dyn Hittable>)
            .collect();
        let bvh = BvhNode::new(shared, 0.0, 1.0);

        let sum_area = triangle_areas.iter().sum();
        let triangle_distribution = Distribution1D::new(&triangle_areas);

        Ok(Self {
            triangles,
            bvh,
            triangle_distribution,
            sum_area,
        })
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        let (idx, _, _) = self.triangle_distribution.sample_discrete(random_f32());
        let sample = self.triangles[idx].sample_surface()?;
        Some(SurfaceSample {
            area: self.sum_area,
            ..sample
        })
    }

    fn stamp_light_id(&self, id: usize) {
        for triangle in &self.triangles {
            triangle.store_light_id(id);
        }
    }
}

/// Lambertian built from MTL attributes, with optional diffuse and normal
/// textures resolved relative to the OBJ location.
fn build_mtl_material(m: &tobj::Material, base_dir: &Path) -> Arc<dyn Material> {
    let albedo: Arc<dyn Texture> = match &m.diffuse_texture {
        Some(tex_name) => Arc::new(ImageTexture::new(base_dir.join(tex_name))),
        None => {
            let diffuse = m.diffuse.unwrap_or([0.5, 0.5, 0.5]);
            Arc::new(SolidColor::new(Vec3::from_array(diffuse)))
        }
    };

    let mut material = Lambertian::from_texture(albedo);
    if let Some(normal_name) = &m.normal_texture {
        material = material.with_normal_map(Arc::new(ImageTexture::new(base_dir.join(normal_name))));
    }
    Arc::new(material)
}

/// A static triangle mesh.
pub struct Mesh {
    data: MeshData,
    material: Option<Arc<dyn Material>>,
    light_id: Option<usize>,
}

impl Mesh {
    /// Load an OBJ file, optionally overriding all face materials.
    pub fn load(
        path: impl AsRef<Path>,
        material: Option<Arc<dyn Material>>,
        transform: MeshTransform,
    ) -> Result<Self, MeshError> {
        let data = MeshData::load(path.as_ref(), material.clone(), transform)?;
        Ok(Self {
            data,
            material,
            light_id: None,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.data.triangles.len()
    }
}

impl Hittable for Mesh {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        self.data.bvh.hit(ray, ray_t, rec)
    }

    fn bounding_box(&self, time0: f32, time1: f32) -> Option<Aabb> {
        self.data.bvh.bounding_box(time0, time1)
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        self.data.sample_surface()
    }

    fn material(&self) -> Option<&dyn Material> {
        self.material.as_deref()
    }

    fn light_id(&self) -> Option<usize> {
        self.light_id
    }

    fn set_light_id(&mut self, id: usize) {
        self.light_id = Some(id);
        // Hits report the individual triangles, so they carry the id too.
        self.data.stamp_light_id(id);
    }
}

/// A mesh translating linearly over the shutter interval.
///
/// Geometry is kept in a local frame; camera rays are moved into that frame
/// before delegating to the internal BVH. Motion is translation only.
pub struct MovingMesh {
    data: MeshData,
    material: Option<Arc<dyn Material>>,
    center0: Vec3,
    center1: Vec3,
    time0: f32,
    time1: f32,
    light_id: Option<usize>,
}

impl MovingMesh {
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        path: impl AsRef<Path>,
        material: Option<Arc<dyn Material>>,
        transform: MeshTransform,
        center0: Vec3,
        center1: Vec3,
        time0: f32,
        time1: f32,
    ) -> Result<Self, MeshError> {
        // Load in the local frame: the translation comes from the motion.
        let local = MeshTransform {
            translation: Vec3::ZERO,
            ..transform
        };
        let data = MeshData::load(path.as_ref(), material.clone(), local)?;
        Ok(Self {
            data,
            material,
            center0,
            center1,
            time0,
            time1,
            light_id: None,
        })
    }

    pub fn center_at(&self, time: f32) -> Vec3 {
        self.center0 + ((time - self.time0) / (self.time1 - self.time0)) * (self.center1 - self.center0)
    }
}

impl Hittable for MovingMesh {
    fn hit<'a>(&'a self, ray: &Ray, ray_t: Interval, rec: &mut HitRecord<'a>) -> bool {
        let center = self.center_at(ray.time());
        let moved_ray = Ray::with_wavelength(
            ray.origin() - center,
            ray.direction(),
            ray.time(),
            ray.wavelength(),
        );

        if !self.data.bvh.hit(&moved_ray, ray_t, rec) {
            return false;
        }

        // Back to world space; translation leaves normals untouched.
        rec.p += center;
        true
    }

    fn bounding_box(&self, time0: f32, time1: f32) -> Option<Aabb> {
        let local = self.data.bvh.bounding_box(0.0, 0.0)?;
        let box0 = local.translate(self.center_at(time0));
        let box1 = local.translate(self.center_at(time1));
        Some(Aabb::surrounding(&box0, &box1))
    }

    fn sample_surface(&self) -> Option<SurfaceSample> {
        let sample = self.data.sample_surface()?;
        let time = random_range(self.time0, self.time1);
        Some(SurfaceSample {
            position: sample.position + self.center_at(time),
            ..sample
        })
    }

    fn material(&self) -> Option<&dyn Material> {
        self.material.as_deref()
    }

    fn light_id(&self) -> Option<usize> {
        self.light_id
    }

    fn set_light_id(&mut self, id: usize) {
        self.light_id = Some(id);
        self.data.stamp_light_id(id);
    }
}
