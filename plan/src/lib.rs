//! Floor-plan marking engine for fire-stop penetration surveys.
//!
//! An inspector imports floor-plan images, pans and zooms them with touch
//! gestures, and long-presses to drop numbered markers through a magnifier.
//! Each marker carries a photo and a short survey form. Nearby markers merge
//! into one labelled pin. The project persists through a pluggable store,
//! round-trips through a portable archive, and exports as a report of photos
//! and annotated maps.
//!
//! The gesture engine never touches storage: it returns
//! [`engine::Action`]s for the host to apply, and the host drives a
//! [`session::Session`] for everything that persists.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Touch gesture engine and its [`engine::Action`]s |
//! | [`input`] | Interaction modes and gesture states |
//! | [`transform`] | View transform and screen/image coordinate conversion |
//! | [`loupe`] | Magnifier sampling and placement |
//! | [`cluster`] | Proximity merging of markers into labelled pins |
//! | [`doc`] | Project, plan and marker types; in-memory marker store |
//! | [`store`] | Async persistence bridge and in-memory backend |
//! | [`session`] | Project lifecycle with store-backed rollback |
//! | [`archive`] | Portable project archive pack/unpack |
//! | [`export`] | Report assembly: photo names and marked maps |
//! | [`render`] | Raster marking of plans for export |
//! | [`decode`] | Image decoding seam |
//! | [`consts`] | Shared numeric constants (zoom limits, loupe size, etc.) |

pub mod archive;
pub mod cluster;
pub mod consts;
pub mod decode;
pub mod doc;
pub mod engine;
pub mod export;
pub mod input;
pub mod loupe;
pub mod render;
pub mod session;
pub mod store;
pub mod transform;
#[cfg(feature = "web")]
pub mod web;
