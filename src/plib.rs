//! Presentation-library interface types.
//!
//! The look-up-table compiler and HPGL parser live outside this crate; what
//! arrives here is their output: per-object *command word* lists and vector
//! object definitions for symbols, complex linestyles and area patterns.
//! Command words are a tagged union the renderer matches exactly once per
//! word; the per-symbol-name specialization happens in a second match under
//! the `Sy` arm.

use smallvec::SmallVec;

use crate::geo::Feature;

/// LS line style letter: `L` solid, `S` dash (3.6/1.8 mm), `T` dot
/// (0.6/1.2 mm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyleKind {
    Solid,
    Dashed,
    Dotted,
}

/// Where a text command takes its string from.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSource {
    /// TX with a literal string.
    Literal(String),
    /// TE: `format` is applied to the value of attribute `attr`
    /// (`%s`-style, one substitution).
    Attribute { format: String, attr: String },
}

/// TE/TX parameters after LUP compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDef {
    pub source: TextSource,
    /// Pen offsets from the anchor point, millimeters.
    pub xoffs_mm: f64,
    pub yoffs_mm: f64,
    /// Color token.
    pub color: String,
    /// Atlas size class 0..=3 (base, +6, +12, +18 pt).
    pub size: u8,
    /// Text view group for display filtering.
    pub group: u32,
}

/// One rendering instruction from a feature's command list.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandWord {
    /// Centered symbol; `rot_deg` is the PLib rotation added to the
    /// object's own orientation.
    Sy { name: String, rot_deg: f64 },
    /// Simple line.
    Ls {
        style: LineStyleKind,
        /// Pen width in units of 0.32 mm.
        width: u8,
        color: String,
    },
    /// Complex line: a linestyle vector object repeated along the line.
    Lc { name: String },
    /// Area color fill; `trans` is 0..=3 quarters of transparency.
    Ac { color: String, trans: u8 },
    /// Area pattern fill.
    Ap { name: String },
    Text(TextDef),
    /// Unresolved conditional symbology; logged and skipped.
    Cs { name: String },
    /// Display-priority override; a no-op at render time.
    Op { prio: u8 },
}

/// What a vector object definition is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Symbol,
    LineStyle,
    Pattern,
}

/// One HPGL-style plotter instruction. Coordinates are in 0.01 mm relative
/// to the definition's pivot.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorOp {
    /// Select a pen color token; opens a new color sublist.
    SetColor(String),
    /// Pen width in units of 0.32 mm.
    SetWidth(u8),
    /// Pen up, move to.
    MoveTo(f64, f64),
    /// Pen down through the listed points.
    PolyLine(Vec<(f64, f64)>),
    /// Circle of the given radius at the current position; filled or
    /// outlined.
    Circle { radius: f64, fill: bool },
    /// Filled polygon through the listed points.
    Polygon(Vec<(f64, f64)>),
    /// Push a modelview offset before the following ops (sub-symbol
    /// placement inside a composed program).
    Translate(f64, f64),
}

/// Tile geometry of a pattern definition, 0.01 mm units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSpec {
    pub width: f64,
    pub height: f64,
    /// Horizontal stagger applied to every other row.
    pub stagger_x: f64,
}

/// A compiled vector object: symbol, complex-linestyle or pattern program.
#[derive(Debug, Clone)]
pub struct VectorDef {
    pub name: String,
    pub kind: VectorKind,
    /// Pivot (origin) of the program, 0.01 mm.
    pub pivot: (f64, f64),
    /// Bounding size of the program, 0.01 mm.
    pub size: (f64, f64),
    /// Nominal stroke width, units of 0.32 mm.
    pub pen_width: u8,
    /// Linestyle repeat length along the line, 0.01 mm (LC only).
    pub symlen: f64,
    /// Pattern tile geometry (AP only).
    pub tile: Option<TileSpec>,
    pub ops: Vec<VectorOp>,
}

impl VectorDef {
    pub fn builder(name: &str, kind: VectorKind) -> VectorDefBuilder {
        VectorDefBuilder {
            def: VectorDef {
                name: name.to_owned(),
                kind,
                pivot: (0.0, 0.0),
                size: (0.0, 0.0),
                pen_width: 1,
                symlen: 0.0,
                tile: None,
                ops: Vec::new(),
            },
        }
    }
}

/// Fluent construction of vector definitions, mainly for tests and the
/// built-in mariner symbols.
pub struct VectorDefBuilder {
    def: VectorDef,
}

impl VectorDefBuilder {
    pub fn pivot(mut self, x: f64, y: f64) -> Self {
        self.def.pivot = (x, y);
        self
    }

    pub fn size(mut self, w: f64, h: f64) -> Self {
        self.def.size = (w, h);
        self
    }

    pub fn pen_width(mut self, w: u8) -> Self {
        self.def.pen_width = w;
        self
    }

    pub fn symlen(mut self, len: f64) -> Self {
        self.def.symlen = len;
        self
    }

    pub fn tile(mut self, width: f64, height: f64, stagger_x: f64) -> Self {
        self.def.tile = Some(TileSpec {
            width,
            height,
            stagger_x,
        });
        self
    }

    pub fn op(mut self, op: VectorOp) -> Self {
        self.def.ops.push(op);
        self
    }

    pub fn build(self) -> VectorDef {
        self.def
    }
}

/// A chart object as the scene driver hands it to the renderer: the S-57
/// feature plus its compiled command list and display priority.
#[derive(Debug)]
pub struct S52Object {
    pub feature: Feature,
    pub commands: SmallVec<[CommandWord; 4]>,
    /// Display priority layer 0..=9 assigned by the LUP.
    pub prio: u8,
    /// Drawn over the radar backdrop.
    pub over_radar: bool,
}

impl S52Object {
    pub fn new(feature: Feature) -> Self {
        Self {
            feature,
            commands: SmallVec::new(),
            prio: 0,
            over_radar: false,
        }
    }

    pub fn with_commands(
        feature: Feature,
        commands: impl IntoIterator<Item = CommandWord>,
    ) -> Self {
        let mut obj = Self::new(feature);
        obj.commands.extend(commands);
        obj
    }

    pub fn push_command(&mut self, cmd: CommandWord) {
        self.commands.push(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_a_pattern_def() {
        let def = VectorDef::builder("DIAMOND1", VectorKind::Pattern)
            .pivot(150.0, 150.0)
            .size(300.0, 300.0)
            .pen_width(1)
            .tile(600.0, 600.0, 300.0)
            .op(VectorOp::SetColor("CHGRD".into()))
            .op(VectorOp::MoveTo(0.0, 150.0))
            .op(VectorOp::PolyLine(vec![
                (150.0, 300.0),
                (300.0, 150.0),
                (150.0, 0.0),
                (0.0, 150.0),
            ]))
            .build();
        assert_eq!(def.kind, VectorKind::Pattern);
        assert_eq!(def.tile.unwrap().stagger_x, 300.0);
        assert_eq!(def.ops.len(), 3);
    }

    #[test]
    fn object_collects_commands_in_order() {
        let mut obj = S52Object::new(Feature::point([0.0; 3]));
        obj.push_command(CommandWord::Ac {
            color: "DEPDW".into(),
            trans: 0,
        });
        obj.push_command(CommandWord::Sy {
            name: "BOYLAT23".into(),
            rot_deg: 0.0,
        });
        assert!(matches!(obj.commands[0], CommandWord::Ac { .. }));
        assert!(matches!(obj.commands[1], CommandWord::Sy { .. }));
    }
}
