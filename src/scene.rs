// src/scene.rs
// Scene graph for the fireplace: a small node arena with parent links, plus the assembly
// step that turns a loaded model into the fireplace / floor / fire / ash hierarchy.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat4, Quat, Vec3};
use log::info;

use crate::assets::{ModelData, TextureStore};
use crate::error::{Error, Result};
use crate::geometry::{CylinderShell, MeshData};
use crate::materials::{MaterialBank, MaterialId, TextureHandle, TintDefaults};

pub const FIREPLACE_OBJECT: &str = "fireplace";
pub const FLOOR_OBJECT: &str = "floor";

/// Fire shell: narrow top, wide base, lifted so its base sits on the hearth.
pub const FIRE_VOLUME: CylinderShell = CylinderShell {
    radius_top: 0.03,
    radius_bottom: 0.2,
    height: 0.35,
    radial_segments: 15,
    height_segments: 15,
    theta_start: -FRAC_PI_2,
    theta_length: PI,
};
pub const FIRE_GEOMETRY_OFFSET: Vec3 = Vec3::new(0.0, 0.1, 0.0);
pub const FIRE_LOCAL_POSITION: Vec3 = Vec3::new(0.1, -0.1, 0.0);

pub const ASH_VOLUME: CylinderShell = CylinderShell {
    radius_top: 0.15,
    radius_bottom: 0.15,
    height: 0.4,
    radial_segments: 15,
    height_segments: 15,
    theta_start: -FRAC_PI_2,
    theta_length: PI,
};
pub const ASH_LOCAL_POSITION: Vec3 = Vec3::new(0.1, 0.1, 0.0);

/// Both volumes face the room: a quarter turn about Y.
pub const VOLUME_YAW: f32 = -FRAC_PI_2;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MeshId(pub u32);

/// Local TRS transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation_yaw(translation: Vec3, yaw: f32) -> Self {
        Self { translation, rotation: Quat::from_rotation_y(yaw), scale: Vec3::ONE }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<NodeId>,
    pub drawable: Option<(MeshId, MaterialId)>,
}

/// Node arena. Parents are always inserted before their children.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    meshes: Vec<MeshData>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, transform: Transform, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { name: name.into(), transform, parent, drawable: None });
        id
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        let id = MeshId(self.meshes.len() as u32);
        self.meshes.push(mesh);
        id
    }

    pub fn attach(&mut self, node: NodeId, mesh: MeshId, material: MaterialId) {
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.drawable = Some((mesh, material));
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.0 as usize)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &MeshData)> {
        self.meshes.iter().enumerate().map(|(i, m)| (MeshId(i as u32), m))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Local transform composed with every ancestor.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else { break };
            matrix = node.transform.matrix() * matrix;
            cursor = node.parent;
        }
        matrix
    }

    /// Every node that has a mesh, with its world matrix.
    pub fn drawables(&self) -> impl Iterator<Item = Drawable> + '_ {
        self.nodes.iter().enumerate().filter_map(move |(i, n)| {
            let (mesh, material) = n.drawable?;
            let node = NodeId(i as u32);
            Some(Drawable { node, mesh, material, world: self.world_matrix(node) })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub node: NodeId,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub world: Mat4,
}

/// Materials the animation loop writes every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneMaterials {
    pub fireplace: MaterialId,
    pub floor: MaterialId,
    pub fire: MaterialId,
    pub ash: MaterialId,
}

/// The assembled scene and the nodes the rest of the app refers to.
#[derive(Debug)]
pub struct FireplaceScene {
    pub graph: SceneGraph,
    pub fireplace: NodeId,
    pub floor: NodeId,
    pub fire: NodeId,
    pub ash: NodeId,
    pub materials: SceneMaterials,
}

impl FireplaceScene {
    /// Build the scene from `model`.
    ///
    /// `fireplace` and `floor` must both exist and carry a base colour texture; anything else
    /// is a fatal setup error. The noise texture must already be registered in `textures`.
    pub fn assemble(
        model: ModelData,
        noise: TextureHandle,
        bank: &mut MaterialBank,
        textures: &mut TextureStore,
    ) -> Result<Self> {
        let mut model = model;
        let fireplace_obj = model
            .take_object(FIREPLACE_OBJECT)
            .ok_or_else(|| Error::fatal_setup(format!("model has no `{FIREPLACE_OBJECT}` object")))?;
        let floor_obj = model
            .take_object(FLOOR_OBJECT)
            .ok_or_else(|| Error::fatal_setup(format!("model has no `{FLOOR_OBJECT}` object")))?;

        let fireplace_map = fireplace_obj
            .texture
            .ok_or_else(|| Error::fatal_setup(format!("`{FIREPLACE_OBJECT}` has no lightmap texture")))?;
        let floor_map = floor_obj
            .texture
            .ok_or_else(|| Error::fatal_setup(format!("`{FLOOR_OBJECT}` has no lightmap texture")))?;

        let fireplace_tex = textures.insert(fireplace_map);
        let floor_tex = textures.insert(floor_map);

        let fireplace_mat = bank.create_lightmap_material(fireplace_tex, TintDefaults::default());
        let floor_mat = bank.clone_lightmap_material(fireplace_mat, floor_tex)?;
        let fire_mat = bank.create_fire_material(noise);
        let ash_mat = bank.create_ash_material(noise);

        let mut graph = SceneGraph::new();

        let fireplace = graph.add_node(FIREPLACE_OBJECT, fireplace_obj.transform, None);
        let mesh = graph.add_mesh(fireplace_obj.mesh);
        graph.attach(fireplace, mesh, fireplace_mat);

        let floor = graph.add_node(FLOOR_OBJECT, floor_obj.transform, None);
        let mesh = graph.add_mesh(floor_obj.mesh);
        graph.attach(floor, mesh, floor_mat);

        let mut fire_mesh = FIRE_VOLUME.build();
        fire_mesh.apply_matrix(Mat4::from_translation(FIRE_GEOMETRY_OFFSET));
        let fire = graph.add_node(
            "fire",
            Transform::from_translation_yaw(FIRE_LOCAL_POSITION, VOLUME_YAW),
            Some(fireplace),
        );
        let mesh = graph.add_mesh(fire_mesh);
        graph.attach(fire, mesh, fire_mat);

        let ash = graph.add_node(
            "ash",
            Transform::from_translation_yaw(ASH_LOCAL_POSITION, VOLUME_YAW),
            Some(fireplace),
        );
        let mesh = graph.add_mesh(ASH_VOLUME.build());
        graph.attach(ash, mesh, ash_mat);

        info!(
            "scene assembled: {} nodes, {} materials, {} textures",
            graph.len(),
            bank.len(),
            textures.len()
        );

        Ok(Self {
            graph,
            fireplace,
            floor,
            fire,
            ash,
            materials: SceneMaterials {
                fireplace: fireplace_mat,
                floor: floor_mat,
                fire: fire_mat,
                ash: ash_mat,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ModelObject, TextureData, WrapMode};

    fn object(name: &str, translation: Vec3, with_texture: bool) -> ModelObject {
        ModelObject {
            name: name.to_string(),
            transform: Transform { translation, ..Transform::IDENTITY },
            mesh: MeshData::default(),
            texture: with_texture.then(|| TextureData::solid(name, [200, 100, 50, 255], WrapMode::ClampToEdge)),
        }
    }

    fn setup(model: ModelData) -> Result<(FireplaceScene, MaterialBank, TextureStore)> {
        let mut bank = MaterialBank::new();
        let mut textures = TextureStore::new();
        let noise = textures.insert(TextureData::solid("noise", [128; 4], WrapMode::Repeat));
        let scene = FireplaceScene::assemble(model, noise, &mut bank, &mut textures)?;
        Ok((scene, bank, textures))
    }

    #[test]
    fn volumes_follow_the_fireplace() {
        let model = ModelData {
            objects: vec![
                object("floor", Vec3::ZERO, true),
                object("fireplace", Vec3::new(0.0, 0.5, -1.0), true),
                object("mantel_clock", Vec3::ONE, false),
            ],
        };
        let (scene, bank, textures) = setup(model).unwrap();

        assert_eq!(scene.graph.node(scene.fire).unwrap().parent, Some(scene.fireplace));
        assert_eq!(scene.graph.node(scene.ash).unwrap().parent, Some(scene.fireplace));
        assert_eq!(bank.len(), 4);
        assert_eq!(textures.len(), 3);

        // local (0.1, -0.1, 0) under a fireplace at (0, 0.5, -1)
        let fire_origin = scene.graph.world_matrix(scene.fire).transform_point3(Vec3::ZERO);
        assert!((fire_origin - Vec3::new(0.1, 0.4, -1.0)).length() < 1e-6);

        // moving the anchor moves the volumes with it
        let mut graph = scene.graph;
        graph.node_mut(scene.fireplace).unwrap().transform.translation = Vec3::new(2.0, 0.0, 0.0);
        let ash_origin = graph.world_matrix(scene.ash).transform_point3(Vec3::ZERO);
        assert!((ash_origin - Vec3::new(2.1, 0.1, 0.0)).length() < 1e-6);

        assert_eq!(graph.drawables().count(), 4);
    }

    #[test]
    fn volume_rotation_faces_the_room() {
        let model = ModelData {
            objects: vec![object("fireplace", Vec3::ZERO, true), object("floor", Vec3::ZERO, true)],
        };
        let (scene, _, _) = setup(model).unwrap();
        // the shell's closed side (+Z) turns to -X
        let facing = scene.graph.world_matrix(scene.fire).transform_vector3(Vec3::Z);
        assert!((facing - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn missing_floor_is_fatal() {
        let model = ModelData { objects: vec![object("fireplace", Vec3::ZERO, true)] };
        let err = setup(model).unwrap_err();
        assert!(err.is_fatal_setup());
        assert!(err.to_string().contains("floor"));
    }

    #[test]
    fn missing_lightmap_texture_is_fatal() {
        let model = ModelData {
            objects: vec![object("fireplace", Vec3::ZERO, false), object("floor", Vec3::ZERO, true)],
        };
        let err = setup(model).unwrap_err();
        assert!(err.is_fatal_setup());
        assert!(err.to_string().contains("lightmap texture"));
    }
}
