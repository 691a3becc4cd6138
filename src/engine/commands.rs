//! The command-word interpreter.
//!
//! One match per word; the per-symbol-name specialization is a second match
//! inside the `Sy` arm (`symbols::plan_sy`). Unresolved conditional
//! symbology is logged and skipped, priority overrides are a no-op here
//! (the scene driver honors them when ordering features).

use crate::error::Result;
use crate::plib::{CommandWord, S52Object};

use super::types::{CmdFilter, Planner};

fn admitted(cmd: &CommandWord, filter: CmdFilter) -> bool {
    match filter {
        CmdFilter::NoText => !matches!(cmd, CommandWord::Text(_)),
        CmdFilter::TextOnly => matches!(cmd, CommandWord::Text(_)),
        CmdFilter::LightsOnly => {
            matches!(cmd, CommandWord::Ls { .. } | CommandWord::Ac { .. })
        }
    }
}

/// Walk the object's command list in order, dispatching each admitted word.
pub(crate) fn plan_object(p: &mut Planner, obj: &mut S52Object, filter: CmdFilter) -> Result<()> {
    for i in 0..obj.commands.len() {
        let cmd = obj.commands[i].clone();
        if !admitted(&cmd, filter) {
            continue;
        }
        match cmd {
            CommandWord::Sy { name, rot_deg } => {
                super::symbols::plan_sy(p, obj, &name, rot_deg)?;
            }
            CommandWord::Ls {
                style,
                width,
                color,
            } => {
                super::lines::plan_ls(p, obj, style, width, &color)?;
            }
            CommandWord::Lc { name } => {
                super::lines::plan_lc(p, obj, &name)?;
            }
            CommandWord::Ac { color, trans } => {
                super::areas::plan_ac(p, obj, &color, trans)?;
            }
            CommandWord::Ap { name } => {
                super::areas::plan_ap(p, obj, &name)?;
            }
            CommandWord::Text(def) => {
                super::text::plan_text(p, obj, &def)?;
            }
            CommandWord::Cs { name } => {
                log::debug!(
                    "unresolved conditional symbology {name} on {}",
                    obj.feature.name()
                );
            }
            CommandWord::Op { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::super::frame::{matrix_del, matrix_set, FrameRef};
    use super::super::symbols::SymbolCache;
    use super::super::types::{Cycle, DrawPlan, Env, FramePool, GeomSource, PlanTex, Planner};
    use super::*;
    use crate::geo::Feature;
    use crate::matrix::MatrixStacks;
    use crate::params::{MarParam, MarinerParams};
    use crate::pipeline::Topo;
    use crate::plib::{LineStyleKind, TextDef, TextSource, VectorDef, VectorKind, VectorOp};
    use crate::projection::Projection;
    use crate::tess::Tessellator;
    use crate::text_atlas::TextVertex;
    use crate::view::View;

    struct Harness {
        view: View,
        prj: Projection,
        params: MarinerParams,
        stacks: MatrixStacks,
        pool: FramePool,
        plans: Vec<DrawPlan>,
        symbols: SymbolCache,
        text_cache: lru::LruCache<(u32, u64), Vec<TextVertex>>,
        pending: Vec<String>,
    }

    impl Harness {
        fn new() -> Self {
            let mut prj = Projection::new();
            prj.set_origin(46.8, -71.2).unwrap();
            let mut view = View::new(0.3, 0.3, 800, 600);
            view.set_view(46.8, -71.2, 1.0, 0.0);
            view.recompute(&prj).unwrap();
            let mut stacks = MatrixStacks::new();
            matrix_set(&mut stacks, &view, FrameRef::Prj);
            Self {
                view,
                prj,
                params: MarinerParams::new(),
                stacks,
                pool: FramePool::default(),
                plans: Vec::new(),
                symbols: SymbolCache::new(),
                text_cache: lru::LruCache::new(NonZeroUsize::new(16).unwrap()),
                pending: Vec::new(),
            }
        }

        /// Re-derive the chart frame after a manual projected-view override.
        fn reframe(&mut self) {
            matrix_del(&mut self.stacks);
            matrix_set(&mut self.stacks, &self.view, FrameRef::Prj);
        }

        fn plan(
            &mut self,
            obj: &mut S52Object,
            filter: CmdFilter,
            cycle: Cycle,
            pick: Option<[f32; 4]>,
        ) {
            let env = Env {
                view: &self.view,
                prj: &self.prj,
                params: &self.params,
            };
            let mut p = Planner {
                env,
                stacks: &mut self.stacks,
                pool: &mut self.pool,
                plans: &mut self.plans,
                symbols: &mut self.symbols,
                atlas: None,
                text_cache: &mut self.text_cache,
                cycle,
                pick_color: pick,
                pending_tiles: &mut self.pending,
            };
            plan_object(&mut p, obj, filter).unwrap();
        }
    }

    fn buoy_def() -> VectorDef {
        VectorDef::builder("BOYLAT23", VectorKind::Symbol)
            .pivot(100.0, 100.0)
            .size(200.0, 200.0)
            .op(VectorOp::SetColor("CHBLK".into()))
            .op(VectorOp::MoveTo(100.0, 180.0))
            .op(VectorOp::PolyLine(vec![(40.0, 20.0), (160.0, 20.0), (100.0, 180.0)]))
            .build()
    }

    fn diamond_def() -> VectorDef {
        VectorDef::builder("DIAMOND1", VectorKind::Pattern)
            .pivot(150.0, 150.0)
            .size(300.0, 300.0)
            .tile(600.0, 600.0, 300.0)
            .op(VectorOp::SetColor("CHGRD".into()))
            .op(VectorOp::MoveTo(0.0, 150.0))
            .op(VectorOp::PolyLine(vec![(150.0, 0.0), (300.0, 150.0), (150.0, 300.0), (0.0, 150.0)]))
            .build()
    }

    fn mul_point(mvp: &[f32; 16], x: f32, y: f32) -> (f32, f32) {
        (
            mvp[0] * x + mvp[4] * y + mvp[12],
            mvp[1] * x + mvp[5] * y + mvp[13],
        )
    }

    #[test]
    fn point_symbol_lands_on_the_view_center() {
        let mut h = Harness::new();
        h.symbols.add_def(buoy_def());
        let (cx, cy) = h.prj.geo_to_prj(-71.2, 46.8).unwrap();
        let mut obj = S52Object::with_commands(
            Feature::point([cx, cy, 0.0]),
            [CommandWord::Sy {
                name: "BOYLAT23".into(),
                rot_deg: 0.0,
            }],
        );
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);

        assert!(!h.plans.is_empty());
        for plan in &h.plans {
            assert!(matches!(
                &plan.geom,
                GeomSource::SymbolPrim { name, .. } if name == "BOYLAT23"
            ));
        }
        // the symbol origin projects to NDC (0, 0) = window center
        let (nx, ny) = mul_point(&h.plans[0].uniforms.mvp, 0.0, 0.0);
        assert!(nx.abs() < 1e-5 && ny.abs() < 1e-5, "({nx}, {ny})");
        // one symbol unit is 0.01 mm: 100 units = 1 mm ≈ 3.33 px at 0.3 mm
        let (sx, _) = mul_point(&h.plans[0].uniforms.mvp, 100.0, 0.0);
        let px = sx * 400.0; // NDC to pixels, half width
        assert!((px - 1.0 / 0.3).abs() < 0.05, "px = {px}");
    }

    #[test]
    fn drgare_pattern_obeys_its_toggle() {
        let ring = vec![
            [-1.0, -1.0, 0.0],
            [1.0, -1.0, 0.0],
            [1.0, 1.0, 0.0],
            [-1.0, 1.0, 0.0],
            [-1.0, -1.0, 0.0],
        ];
        let commands = [
            CommandWord::Ap {
                name: "DIAMOND1".into(),
            },
            CommandWord::Ac {
                color: "DEPDW".into(),
                trans: 0,
            },
        ];

        let mut build = |on: bool| {
            let mut h = Harness::new();
            h.symbols.add_def(diamond_def());
            h.params
                .set(MarParam::DispDrgArePattern, if on { 1.0 } else { 0.0 });
            let mut feature = Feature::area(vec![ring.clone()]);
            feature.set_name("DRGARE");
            feature.set_ext(-1.0, -1.0, 1.0, 1.0).unwrap();
            Tessellator::new().tessellate(&mut feature).unwrap();
            let mut obj = S52Object::with_commands(feature, commands.clone());
            // the view is far from the area; pull it over the feature
            h.view.set_projected_view(-5.0, -5.0, 5.0, 5.0).unwrap();
            h.reframe();
            h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);
            (
                h.plans
                    .iter()
                    .filter(|p| matches!(&p.tex, PlanTex::Pattern(n) if n == "DIAMOND1"))
                    .count(),
                h.plans
                    .iter()
                    .filter(|p| matches!(p.tex, PlanTex::None))
                    .count(),
                h.pending.clone(),
            )
        };

        let (patterned, plain, pending) = build(true);
        assert_eq!(patterned, 1);
        assert_eq!(plain, 1); // the AC fill
        assert_eq!(pending, vec!["DIAMOND1".to_owned()]);

        let (patterned, plain, _) = build(false);
        assert_eq!(patterned, 0);
        assert_eq!(plain, 1);
    }

    #[test]
    fn lc_clips_then_places_seven_symbols_and_a_residual() {
        let mut h = Harness::new();
        // one symbol unit = 0.0125 * 0.01 / 0.3 world; 2400 units = 1.0 world
        h.symbols.add_def(
            VectorDef::builder("PLNRTE03", VectorKind::LineStyle)
                .symlen(2400.0)
                .op(VectorOp::SetColor("PLRTE".into()))
                .op(VectorOp::MoveTo(0.0, 0.0))
                .op(VectorOp::PolyLine(vec![(2400.0, 0.0)]))
                .build(),
        );
        h.view.set_projected_view(5.0, 5.0, 15.0, 15.0).unwrap();
        h.reframe();

        let mut feature = Feature::line(vec![[0.0, 0.0, 0.0], [10.0, 10.0, 0.0]]);
        feature.set_name("DWRTPT");
        let mut obj = S52Object::with_commands(
            feature,
            [CommandWord::Lc {
                name: "PLNRTE03".into(),
            }],
        );
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);

        let symbol_plans = h
            .plans
            .iter()
            .filter(|p| matches!(&p.geom, GeomSource::SymbolPrim { .. }))
            .count();
        assert_eq!(symbol_plans, 7); // floor(sqrt(50) / 1.0)
        let residual = h
            .plans
            .iter()
            .filter(|p| matches!(&p.geom, GeomSource::Chart { topo: Topo::Lines, .. }))
            .count();
        assert_eq!(residual, 1);
    }

    #[test]
    fn one_vertex_line_is_a_no_op_for_ls_and_lc() {
        let mut h = Harness::new();
        h.symbols.add_def(buoy_def());
        let mut obj = S52Object::with_commands(
            Feature::line(vec![[0.0, 0.0, 0.0]]),
            [
                CommandWord::Ls {
                    style: LineStyleKind::Solid,
                    width: 1,
                    color: "CHBLK".into(),
                },
                CommandWord::Lc {
                    name: "BOYLAT23".into(),
                },
            ],
        );
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);
        assert!(h.plans.is_empty());
    }

    #[test]
    fn pick_cycle_overrides_color_and_disables_styling() {
        let mut h = Harness::new();
        h.symbols.add_def(buoy_def());
        let (cx, cy) = h.prj.geo_to_prj(-71.2, 46.8).unwrap();
        let mut obj = S52Object::with_commands(
            Feature::point([cx, cy, 0.0]),
            [CommandWord::Sy {
                name: "BOYLAT23".into(),
                rot_deg: 0.0,
            }],
        );
        let index_color = [7.0 / 255.0, 0.0, 0.0, 1.0];
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Pick, Some(index_color));
        assert!(!h.plans.is_empty());
        for plan in &h.plans {
            assert!(plan.opaque);
            assert_eq!(plan.uniforms.color, index_color);
            assert_eq!(plan.uniforms.mode, crate::pipeline::MODE_SOLID);
            assert_eq!(plan.tex, PlanTex::None);
        }
    }

    #[test]
    fn text_is_filtered_by_entry_point_not_dropped() {
        let mut h = Harness::new();
        let mut feature = Feature::point([0.0, 0.0, 0.0]);
        feature.set_attribute("OBJNAM", "Haut-fond");
        let mut obj = S52Object::with_commands(
            feature,
            [
                CommandWord::Sy {
                    name: "NOSUCH00".into(),
                    rot_deg: 0.0,
                },
                CommandWord::Text(TextDef {
                    source: TextSource::Attribute {
                        format: "%s".into(),
                        attr: "OBJNAM".into(),
                    },
                    xoffs_mm: 0.0,
                    yoffs_mm: 0.0,
                    color: "CHBLK".into(),
                    size: 0,
                    group: 20,
                }),
            ],
        );
        // NoText admits nothing here (symbol lacks a def), TextOnly would
        // hit the missing-atlas early-out without recording anything
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);
        assert!(h.plans.is_empty());
        h.plan(&mut obj, CmdFilter::TextOnly, Cycle::Last, None);
        assert!(h.plans.is_empty());
    }

    #[test]
    fn leglin_ls_draws_dotted_with_shortened_ends() {
        let mut h = Harness::new();
        h.view.set_projected_view(0.0, 0.0, 100.0, 100.0).unwrap();
        h.reframe();
        let mut feature = Feature::line(vec![[10.0, 10.0, 0.0], [90.0, 90.0, 0.0]]);
        feature.set_name("leglin");
        feature.set_attribute("_wholin_dist", "0.01"); // 18.52 m off the end
        feature.set_attribute("_prev_wholin_dist", "0.02"); // 37.04 m off the start
        let mut obj = S52Object::with_commands(
            feature,
            [CommandWord::Ls {
                style: LineStyleKind::Solid,
                width: 1,
                color: "PLRTE".into(),
            }],
        );
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);

        assert_eq!(h.plans.len(), 1);
        let plan = &h.plans[0];
        // the dedicated path forces the dotted style regardless of the LS letter
        assert_eq!(plan.tex, PlanTex::Stipple(LineStyleKind::Dotted));
        assert_eq!(plan.uniforms.mode, crate::pipeline::MODE_STIPPLE);
        let GeomSource::Chart { first, count, topo } = &plan.geom else {
            panic!("chart plan expected");
        };
        assert_eq!(*topo, Topo::LineStrip);
        assert_eq!(*count, 2);
        let a = h.pool.chart[*first as usize].position;
        let b = h.pool.chart[*first as usize + 1].position;
        // 0.02 NM along the 45° leg: 37.04 / sqrt(2) = 26.191 off the start
        assert!((a[0] - 36.191).abs() < 0.01 && (a[1] - 36.191).abs() < 0.01);
        assert!((b[0] - 76.904).abs() < 0.01 && (b[1] - 76.904).abs() < 0.01);
    }

    #[test]
    fn leglin_ls_rejects_more_than_two_vertices() {
        let mut h = Harness::new();
        h.view.set_projected_view(0.0, 0.0, 100.0, 100.0).unwrap();
        h.reframe();
        let mut feature =
            Feature::line(vec![[10.0, 10.0, 0.0], [50.0, 50.0, 0.0], [90.0, 90.0, 0.0]]);
        feature.set_name("leglin");
        let mut obj = S52Object::with_commands(
            feature,
            [CommandWord::Ls {
                style: LineStyleKind::Solid,
                width: 1,
                color: "PLRTE".into(),
            }],
        );
        let env = Env {
            view: &h.view,
            prj: &h.prj,
            params: &h.params,
        };
        let mut p = Planner {
            env,
            stacks: &mut h.stacks,
            pool: &mut h.pool,
            plans: &mut h.plans,
            symbols: &mut h.symbols,
            atlas: None,
            text_cache: &mut h.text_cache,
            cycle: Cycle::Draw,
            pick_color: None,
            pending_tiles: &mut h.pending,
        };
        assert!(plan_object(&mut p, &mut obj, CmdFilter::NoText).is_err());
        assert!(h.plans.is_empty());
    }

    #[test]
    fn pastrk_draws_trail_and_fix_ticks() {
        let mut h = Harness::new();
        h.view.set_projected_view(0.0, 0.0, 100.0, 100.0).unwrap();
        h.reframe();
        let mut feature = Feature::line(vec![
            [10.0, 10.0, 0.0],
            [50.0, 10.0, 0.0],
            [90.0, 10.0, 0.0],
        ]);
        feature.set_name("pastrk");
        let mut obj = S52Object::with_commands(
            feature,
            [CommandWord::Ls {
                style: LineStyleKind::Solid,
                width: 1,
                color: "PSTRK".into(),
            }],
        );
        h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);

        assert_eq!(h.plans.len(), 2);
        assert!(matches!(
            &h.plans[0].geom,
            GeomSource::Chart {
                topo: Topo::LineStrip,
                count: 3,
                ..
            }
        ));
        let GeomSource::Chart { first, count, topo } = &h.plans[1].geom else {
            panic!("tick plan expected");
        };
        assert_eq!(*topo, Topo::Lines);
        assert_eq!(*count, 6); // one cross tick per fix
        // the track runs east-west, so ticks run north-south
        let tick = h.pool.chart[*first as usize];
        assert_eq!(tick.position[0], 10.0);
        assert!(tick.position[1] != 10.0);
    }

    #[test]
    fn two_identical_walks_record_identical_plans() {
        let run = || {
            let mut h = Harness::new();
            h.symbols.add_def(buoy_def());
            let (cx, cy) = h.prj.geo_to_prj(-71.19, 46.81).unwrap();
            let mut obj = S52Object::with_commands(
                Feature::point([cx, cy, 0.0]),
                [CommandWord::Sy {
                    name: "BOYLAT23".into(),
                    rot_deg: 30.0,
                }],
            );
            h.plan(&mut obj, CmdFilter::NoText, Cycle::Draw, None);
            let uniforms: Vec<_> = h.plans.iter().map(|p| p.uniforms).collect();
            (uniforms, h.pool.chart.clone())
        };
        let (ua, ca) = run();
        let (ub, cb) = run();
        assert_eq!(ua, ub);
        assert_eq!(ca, cb);
    }
}
