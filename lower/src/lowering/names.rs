//! The qualified naming scheme.
//!
//! Loop variables are globally unique by construction:
//! `<func>.s<stage>.<dim>` where `<dim>` is the hierarchical dim name
//! splits produce (`x`, `x.xo`, `x.xo.xoo`, ...). Reduction variables
//! use `$` in their own names (`r$x`) and so never collide with split
//! segments. Per-stage loop bounds are bound to
//! `<func>.s<stage>.<arg>.loop_min` / `.loop_extent` lets at the
//! compute site, which is the hook sliding-window rewrites.

/// The loop variable (or reconstruction let) for one dim of one stage.
pub fn dim_var(func: &str, stage: usize, dim: &str) -> String {
    format!("{func}.s{stage}.{dim}")
}

/// The let binding the loop minimum of one pure argument of one stage.
pub fn loop_min_var(func: &str, stage: usize, arg: &str) -> String {
    format!("{func}.s{stage}.{arg}.loop_min")
}

/// The let binding the loop extent of one pure argument of one stage.
pub fn loop_extent_var(func: &str, stage: usize, arg: &str) -> String {
    format!("{func}.s{stage}.{arg}.loop_extent")
}

/// Recover `(func, stage, arg)` from a `loop_min` let name.
pub fn parse_loop_min_var(name: &str) -> Option<(&str, usize, &str)> {
    let rest = name.strip_suffix(".loop_min")?;
    let mut best = None;
    // The stage marker is the last `.s<digits>.` segment.
    for (i, _) in rest.match_indices(".s") {
        let after = &rest[i + 2..];
        if let Some(dot) = after.find('.')
            && after[..dot].chars().all(|c| c.is_ascii_digit())
            && !after[..dot].is_empty()
        {
            best = Some((i, after[..dot].parse::<usize>().ok()?, &after[dot + 1..]));
        }
    }
    let (i, stage, arg) = best?;
    Some((&name[..i], stage, arg))
}

/// The storage buffer name for one component of a function's value
/// tuple.
pub fn component_buffer(func: &str, index: usize, tuple_len: usize) -> String {
    if tuple_len == 1 { func.to_string() } else { format!("{func}.{index}") }
}

/// The closure name parallel-task lowering assigns to an extracted
/// loop body.
pub fn closure_name(loop_var: &str) -> String {
    format!("{loop_var}.par")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_min_round_trip() {
        let name = loop_min_var("blur_x", 0, "x");
        assert_eq!(parse_loop_min_var(&name), Some(("blur_x", 0, "x")));

        let dotted = loop_min_var("f.stage", 2, "y");
        assert_eq!(parse_loop_min_var(&dotted), Some(("f.stage", 2, "y")));

        assert_eq!(parse_loop_min_var("f.s0.x.loop_extent"), None);
    }
}
