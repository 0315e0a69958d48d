//! Minimal data-block database the relation builder reads from.
//!
//! Only what relation building consults is modeled: names, the kind of each
//! data-block, and rigid body settings of objects.

use std::fmt;

/// Handle of a data-block in a [`Main`] database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdKey(pub(crate) u32);

impl IdKey {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID#{}", self.0)
    }
}

/// Collision shape of a rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RigidBodyShape {
    /// Axis aligned box.
    #[default]
    Box = 0,
    /// Sphere.
    Sphere = 1,
    /// Capsule along the local Z axis.
    Capsule = 2,
    /// Cylinder along the local Z axis.
    Cylinder = 3,
    /// Cone along the local Z axis.
    Cone = 4,
    /// Convex hull of the mesh vertices.
    ConvexHull = 5,
    /// The mesh triangles themselves.
    TriangleMesh = 6,
    /// Union of the shapes of child objects.
    Compound = 7,
}

/// Which mesh a rigid body builds its collision shape from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RigidBodyMeshSource {
    /// The mesh without modifiers.
    #[default]
    Base = 0,
    /// The mesh after deforming modifiers.
    Deform = 1,
    /// The fully evaluated mesh.
    Final = 2,
}

/// Rigid body settings of an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RigidBodyObject {
    /// Collision shape.
    pub shape: RigidBodyShape,
    /// Mesh used by mesh based shapes.
    pub mesh_source: RigidBodyMeshSource,
}

impl RigidBodyObject {
    /// True if the collision shape is built from evaluated geometry.
    ///
    /// Mesh based shapes read the evaluated mesh unless they use the base
    /// mesh; primitive shapes never do.
    pub fn depends_on_evaluated_geometry(&self) -> bool {
        matches!(self.shape, RigidBodyShape::ConvexHull | RigidBodyShape::TriangleMesh)
            && self.mesh_source != RigidBodyMeshSource::Base
    }
}

/// Kind of data an object carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// No data.
    #[default]
    Empty,
    /// Polygon mesh.
    Mesh,
    /// Lattice deformer cage.
    Lattice,
    /// Curve, usable as a spline IK path.
    Curve,
    /// Armature with a pose.
    Armature,
}

impl ObjectType {
    /// True if the object has vertex groups a constraint can target.
    pub fn has_vertex_groups(self) -> bool {
        matches!(self, Self::Mesh | Self::Lattice)
    }

    /// True if the object has a geometry component.
    pub fn has_geometry(self) -> bool {
        matches!(self, Self::Mesh | Self::Lattice | Self::Curve)
    }
}

/// Object specific data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectData {
    /// What the object carries.
    pub object_type: ObjectType,
    /// Rigid body settings, if the object takes part in the simulation.
    pub rigidbody: Option<RigidBodyObject>,
}

/// What a data-block is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdKind {
    /// An object placed in the scene.
    Object(ObjectData),
    /// Armature data used by rigged objects.
    Armature,
    /// A node tree, e.g. a shader or geometry node group.
    NodeTree,
    /// A scene.
    Scene,
    /// Anything relation building does not distinguish.
    Other,
}

impl IdKind {
    /// Two-letter code prefixed to data-block names in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Object(_) => "OB",
            Self::Armature => "AR",
            Self::NodeTree => "NT",
            Self::Scene => "SC",
            Self::Other => "ID",
        }
    }

    /// Returns the type without its payload.
    pub fn id_type(&self) -> IdType {
        match self {
            Self::Object(_) => IdType::Object,
            Self::Armature => IdType::Armature,
            Self::NodeTree => IdType::NodeTree,
            Self::Scene => IdType::Scene,
            Self::Other => IdType::Other,
        }
    }
}

/// [`IdKind`] without payload, stored on graph nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum IdType {
    Object,
    Armature,
    NodeTree,
    Scene,
    Other,
}

/// One data-block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdData {
    /// Name without the kind code.
    pub name: String,
    /// Kind and kind specific data.
    pub kind: IdKind,
}

impl IdData {
    /// Name with the kind code prefixed, e.g. `OBCube`.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.kind.code(), self.name)
    }

    /// Object type, or `None` if this is not an object.
    pub fn object_type(&self) -> Option<ObjectType> {
        match &self.kind {
            IdKind::Object(object) => Some(object.object_type),
            _ => None,
        }
    }

    /// Rigid body settings, if this is an object that has them.
    pub fn rigidbody(&self) -> Option<&RigidBodyObject> {
        match &self.kind {
            IdKind::Object(object) => object.rigidbody.as_ref(),
            _ => None,
        }
    }
}

/// Database of all data-blocks.
#[derive(Clone, Debug, Default)]
pub struct Main {
    ids: Vec<IdData>,
}

impl Main {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data-block and returns its key.
    pub fn add(&mut self, name: impl Into<String>, kind: IdKind) -> IdKey {
        let key = IdKey(self.ids.len() as u32);
        self.ids.push(IdData {
            name: name.into(),
            kind,
        });
        key
    }

    /// Shorthand for an empty object without rigid body.
    pub fn add_object(&mut self, name: impl Into<String>) -> IdKey {
        self.add(name, IdKind::Object(ObjectData::default()))
    }

    /// Shorthand for an object of `object_type` without rigid body.
    pub fn add_typed_object(&mut self, name: impl Into<String>, object_type: ObjectType) -> IdKey {
        self.add(
            name,
            IdKind::Object(ObjectData {
                object_type,
                rigidbody: None,
            }),
        )
    }

    /// Object type of `key`, `None` for unknown keys and non-objects.
    pub fn object_type(&self, key: IdKey) -> Option<ObjectType> {
        self.get(key).and_then(IdData::object_type)
    }

    /// Returns the data-block, or `None` for a key from another database.
    pub fn get(&self, key: IdKey) -> Option<&IdData> {
        self.ids.get(key.index())
    }

    /// Mutable access to a data-block.
    pub fn get_mut(&mut self, key: IdKey) -> Option<&mut IdData> {
        self.ids.get_mut(key.index())
    }

    /// Name used in diagnostics. Unknown keys print as `ID#n`.
    pub fn display_name(&self, key: IdKey) -> String {
        self.get(key).map_or_else(|| key.to_string(), IdData::full_name)
    }

    /// Finds a data-block by its plain name.
    pub fn find(&self, name: &str) -> Option<IdKey> {
        self.ids
            .iter()
            .position(|id| id.name == name)
            .map(|i| IdKey(i as u32))
    }

    /// Number of data-blocks.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the database holds no data-blocks.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates all data-blocks with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (IdKey, &IdData)> {
        self.ids.iter().enumerate().map(|(i, id)| (IdKey(i as u32), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let rig = main.add("Rig", IdKind::Armature);
        assert_eq!(main.len(), 2);
        assert_eq!(main.get(cube).unwrap().name, "Cube");
        assert_eq!(main.display_name(rig), "ARRig");
        assert_eq!(main.find("Rig"), Some(rig));
        assert_eq!(main.find("Missing"), None);
        assert_eq!(main.display_name(IdKey(9)), "ID#9");
    }

    #[test]
    fn test_object_types() {
        let mut main = Main::new();
        let empty = main.add_object("Empty");
        let mesh = main.add_typed_object("Mesh", ObjectType::Mesh);
        let data = main.add("Skeleton", IdKind::Armature);
        assert_eq!(main.object_type(empty), Some(ObjectType::Empty));
        assert_eq!(main.object_type(mesh), Some(ObjectType::Mesh));
        assert_eq!(main.object_type(data), None);
        assert!(ObjectType::Lattice.has_vertex_groups());
        assert!(!ObjectType::Curve.has_vertex_groups());
        assert!(ObjectType::Curve.has_geometry());
    }

    #[test]
    fn test_evaluated_geometry_dependency() {
        let mesh_based = [RigidBodyShape::ConvexHull, RigidBodyShape::TriangleMesh];
        for shape in mesh_based {
            for (source, expected) in [
                (RigidBodyMeshSource::Base, false),
                (RigidBodyMeshSource::Deform, true),
                (RigidBodyMeshSource::Final, true),
            ] {
                let rbo = RigidBodyObject {
                    shape,
                    mesh_source: source,
                };
                assert_eq!(rbo.depends_on_evaluated_geometry(), expected, "{shape:?} {source:?}");
            }
        }
        let primitive = RigidBodyObject {
            shape: RigidBodyShape::Sphere,
            mesh_source: RigidBodyMeshSource::Final,
        };
        assert!(!primitive.depends_on_evaluated_geometry());
    }

    #[test]
    fn test_shape_codes() {
        assert_eq!(RigidBodyShape::Box as u8, 0);
        assert_eq!(RigidBodyShape::Compound as u8, 7);
        assert_eq!(RigidBodyMeshSource::Final as u8, 2);
    }
}
