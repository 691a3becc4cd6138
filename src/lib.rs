//! # Pelorus
//!
//! Pelorus is a GPU-accelerated rendering core for Electronic Navigational
//! Charts: it realizes the IHO S-52 presentation model over S-57 vector
//! features, turning symbology command lists into draw calls through
//! [`wgpu`](https://crates.io/crates/wgpu), with polygon tessellation by
//! [`lyon`](https://crates.io/crates/lyon).
//!
//! ## What it does
//!
//! - **Geometry model**: S-57 feature records (point/line/area/meta) with
//!   attributes, extents, SCAMIN, touch references and centroid caches.
//! - **Command rendering**: `SY`, `LS`, `LC`, `AC`, `AP` and `TE`/`TX`
//!   command words interpreted per object, with the S-52 special cases
//!   (own ship, AIS targets, light sectors, route legs, patterns).
//! - **Headless frames**: render cycles draw into an offscreen target that
//!   can be read back, snapshotted for blit-pan, or dumped to PNG.
//! - **Cursor pick**: a color-index cycle identifies the chart object under
//!   the cursor, aggregation links included.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use futures::executor::block_on;
//! use pelorus::{Cycle, S52Engine};
//!
//! let mut engine = block_on(S52Engine::new_headless(800, 600)).unwrap();
//! engine.init(0.32, 0.32, 800, 600);
//! engine.set_mercator_origin(46.8, -71.2).unwrap();
//! engine.set_view(46.8, -71.2, 1.0, 0.0);
//!
//! // per frame, driven by the scene in display-priority order:
//! engine.begin(Cycle::Draw);
//! // engine.draw(&mut object); ...
//! engine.end(Cycle::Draw);
//! let pixels = engine.read_fb_pixels();
//! ```
//!
//! The S-57 reader, the presentation-library compiler and the scene driver
//! live outside this crate; they feed it [`geo::Feature`] records wrapped in
//! [`plib::S52Object`]s along with [`plib::VectorDef`] symbol programs.

pub use lyon;
pub use wgpu;

pub mod centroid;
pub mod color;
pub mod engine;
pub mod error;
pub mod geo;
pub mod matrix;
pub mod params;
mod pipeline;
pub mod plib;
pub mod primitive;
pub mod projection;
pub mod tess;
pub mod text_atlas;
pub mod view;

pub use color::{palette, Color};
pub use engine::{Cycle, RasterLayer, S52Engine, SymbolCache};
pub use error::{Result, S52Error};
pub use geo::{Feature, FeatureId, GeoKind, TouchRole};
pub use params::{MarParam, MarinerParams};
pub use plib::{CommandWord, LineStyleKind, S52Object, TextDef, TextSource, VectorDef, VectorOp};
pub use primitive::{DrawMode, Primitive};
pub use projection::Projection;
pub use tess::Tessellator;
pub use text_atlas::TextAtlas;
pub use view::View;
