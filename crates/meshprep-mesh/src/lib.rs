//! Mesh I/O: OBJ loading with per-face material indices, and writing the
//! merged result back out. Loading a mesh that references more than one
//! material runs the atlas merger, so a loaded mesh always carries at most
//! one material.

mod obj;

pub use obj::{load_obj, save_obj, Mesh, ObjError};
