//! Common ECS components and pose math

use std::any::TypeId;

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Tolerance used for comparing computed positions, rotations and scales
pub const EPSILON: f32 = 1e-4;

/// Compare two vectors component-wise within [`EPSILON`]
#[must_use]
pub fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

/// Compare two rotations within [`EPSILON`].
///
/// `q` and `-q` describe the same rotation, so the sign is ignored.
#[must_use]
pub fn approx_eq_quat(a: Quat, b: Quat) -> bool {
    a.abs_diff_eq(b, EPSILON) || a.abs_diff_eq(-b, EPSILON)
}

/// Position, rotation and scale as independent components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
    /// Scale factor per axis
    pub scale: Vec3,
}

impl Pose {
    /// The identity pose
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create a pose from its three parts
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create a pose with just a position
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create a pose with position and rotation
    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Decompose an affine matrix into a pose.
    ///
    /// Translation comes from the fourth column, scale from the lengths of the
    /// three basis columns and rotation from those columns once normalized.
    /// Only well-conditioned matrices are supported: a zero scale axis gives
    /// non-finite values, and negative scale or shear are not recovered.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let x = matrix.x_axis.truncate();
        let y = matrix.y_axis.truncate();
        let z = matrix.z_axis.truncate();
        let scale = Vec3::new(x.length(), y.length(), z.length());
        let basis = Mat3::from_cols(x / scale.x, y / scale.y, z / scale.z);

        Self {
            position: matrix.w_axis.truncate(),
            rotation: Quat::from_mat3(&basis).normalize(),
            scale,
        }
    }

    /// Build the matrix that scales, then rotates, then translates
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Get the forward direction (negative Z in local space)
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Get the right direction (positive X in local space)
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get the up direction (positive Y in local space)
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Tolerance-based equality over all three parts
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        approx_eq_vec3(self.position, other.position)
            && approx_eq_quat(self.rotation, other.rotation)
            && approx_eq_vec3(self.scale, other.scale)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Describes one component attached to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentInfo {
    type_id: TypeId,
    type_name: &'static str,
}

impl ComponentInfo {
    /// Describe the component type `T`
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Whether this describes a component of type `T`
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Rust type id of the component
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name, for debugging
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}
