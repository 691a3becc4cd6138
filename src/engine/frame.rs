//! Frame matrix setup.
//!
//! `matrix_set(Prj)` orients the chart: ortho over the projected view, then
//! the view heading rotated in about the view center. `matrix_set(Win)` is a
//! pixel-space ortho for window-anchored graphics (scale bar, text, blits).
//! Both push the pair of stacks; `matrix_del` restores them.

use crate::matrix::{MatrixMode, MatrixStacks};
use crate::view::View;

use super::types::Planner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameRef {
    /// Projected chart coordinates, rotated to the view heading.
    Prj,
    /// Window pixels, origin lower-left.
    Win,
}

pub(crate) fn matrix_set(stacks: &mut MatrixStacks, view: &View, frame: FrameRef) {
    stacks.set_mode(MatrixMode::Projection);
    stacks.push();
    stacks.load_identity();
    match frame {
        FrameRef::Prj => {
            let (s, w, n, e) = view.projected_view();
            stacks.ortho(w, e, s, n, 1.0, -1.0);
            let (cx, cy) = view.projected_center();
            stacks.translate(cx, cy, 0.0);
            stacks.rotate_z(view.north_deg);
            stacks.translate(-cx, -cy, 0.0);
        }
        FrameRef::Win => {
            let (x, y, w, h) = view.viewport();
            stacks.ortho(
                x as f64,
                x as f64 + w as f64,
                y as f64,
                y as f64 + h as f64,
                1.0,
                -1.0,
            );
        }
    }
    stacks.set_mode(MatrixMode::Modelview);
    stacks.push();
    stacks.load_identity();
}

pub(crate) fn matrix_del(stacks: &mut MatrixStacks) {
    stacks.set_mode(MatrixMode::Projection);
    stacks.pop();
    stacks.set_mode(MatrixMode::Modelview);
    stacks.pop();
}

/// Run a recording closure under the window frame, restoring the chart
/// frame afterwards.
pub(crate) fn with_window_frame(p: &mut Planner, f: impl FnOnce(&mut Planner)) {
    matrix_set(p.stacks, p.env.view, FrameRef::Win);
    f(p);
    matrix_del(p.stacks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;

    fn view() -> View {
        let mut prj = Projection::new();
        prj.set_origin(46.8, -71.2).unwrap();
        let mut v = View::new(0.3, 0.3, 800, 600);
        v.set_view(46.8, -71.2, 1.0, 0.0);
        v.recompute(&prj).unwrap();
        v
    }

    #[test]
    fn prj_frame_maps_view_center_to_window_center() {
        let v = view();
        let mut stacks = MatrixStacks::new();
        matrix_set(&mut stacks, &v, FrameRef::Prj);
        let (cx, cy) = v.projected_center();
        let (wx, wy, _) = stacks.prj_to_win(cx, cy, 0.0, (0.0, 0.0, 800.0, 600.0));
        assert!((wx - 400.0).abs() < 1e-6);
        assert!((wy - 300.0).abs() < 1e-6);
        matrix_del(&mut stacks);
    }

    #[test]
    fn heading_rotation_pivots_on_the_center() {
        let mut v = view();
        v.north_deg = 90.0;
        let mut stacks = MatrixStacks::new();
        matrix_set(&mut stacks, &v, FrameRef::Prj);
        let (cx, cy) = v.projected_center();
        // the center stays put under any heading
        let (wx, wy, _) = stacks.prj_to_win(cx, cy, 0.0, (0.0, 0.0, 800.0, 600.0));
        assert!((wx - 400.0).abs() < 1e-6);
        assert!((wy - 300.0).abs() < 1e-6);
        // a point north of center swings to the side under a 90° heading
        let (wx2, wy2, _) = stacks.prj_to_win(cx, cy + 100.0, 0.0, (0.0, 0.0, 800.0, 600.0));
        assert!((wy2 - 300.0).abs() < 1.0);
        assert!((wx2 - 400.0).abs() > 1.0);
        matrix_del(&mut stacks);
    }

    #[test]
    fn set_del_leaves_no_accumulated_state() {
        let v = view();
        let mut stacks = MatrixStacks::new();
        let before = *stacks.current(MatrixMode::Projection);
        for _ in 0..3 {
            matrix_set(&mut stacks, &v, FrameRef::Prj);
            matrix_set(&mut stacks, &v, FrameRef::Win);
            matrix_del(&mut stacks);
            matrix_del(&mut stacks);
        }
        let after = *stacks.current(MatrixMode::Projection);
        assert_eq!(before, after);
    }
}
