//! Material system: material records, the MTL text codec, and the atlas
//! merger that folds a mesh's material set into one uber material with a
//! re-indexed UV atlas.

mod material;
mod merge;
mod mtl;

pub use material::Material;
pub use merge::{merge_materials, MergeError, MergeOutput};
pub use mtl::{load_mtl, save_mtl, MtlError, MtlOptions};
