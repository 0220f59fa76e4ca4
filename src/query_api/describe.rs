//! Renders an operator tree for `EXPLAIN`.

use crate::executor::Op;

pub(super) fn render(op: &Op) -> String {
    let mut out = String::new();
    describe(op, 0, &mut out);
    out
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}

fn describe(op: &Op, depth: usize, out: &mut String) {
    match op {
        Op::Unit => line(out, depth, "Unit"),
        Op::Rows(rows) => line(out, depth, &format!("Rows({})", rows.len())),
        Op::Argument => line(out, depth, "Argument"),
        Op::AllNodes { input, alias } => {
            line(out, depth, &format!("AllNodes({alias})"));
            describe(input, depth + 1, out);
        }
        Op::LabelScan {
            input,
            alias,
            label,
        } => {
            line(out, depth, &format!("LabelScan({alias}:{label})"));
            describe(input, depth + 1, out);
        }
        Op::IndexProbe {
            input,
            alias,
            label,
            property,
            ..
        } => {
            line(
                out,
                depth,
                &format!("IndexProbe({alias}:{label}.{property})"),
            );
            describe(input, depth + 1, out);
        }
        Op::Expand {
            input,
            from,
            to,
            types,
            ..
        } => {
            line(out, depth, &format!("Expand({from})-[{}]-({to})", types.join("|")));
            describe(input, depth + 1, out);
        }
        Op::VarExpand {
            input,
            from,
            to,
            min_hops,
            max_hops,
            ..
        } => {
            let max = max_hops.map_or("∞".to_string(), |m| m.to_string());
            line(
                out,
                depth,
                &format!("VarExpand({from})-[*{min_hops}..{max}]-({to})"),
            );
            describe(input, depth + 1, out);
        }
        Op::BindPath { input, alias, .. } => {
            line(out, depth, &format!("BindPath({alias})"));
            describe(input, depth + 1, out);
        }
        Op::Filter { input, .. } => {
            line(out, depth, "Filter");
            describe(input, depth + 1, out);
        }
        Op::Optional { input, branch, .. } => {
            line(out, depth, "Optional");
            describe(branch, depth + 1, out);
            describe(input, depth + 1, out);
        }
        Op::Project { input, items, star } => {
            let mut names: Vec<&str> = Vec::new();
            if *star {
                names.push("*");
            }
            names.extend(items.iter().map(|(alias, _)| alias.as_str()));
            line(out, depth, &format!("Project({})", names.join(", ")));
            describe(input, depth + 1, out);
        }
        Op::Aggregate { input, keys, folds } => {
            line(
                out,
                depth,
                &format!("Aggregate(keys: {}, folds: {})", keys.len(), folds.len()),
            );
            describe(input, depth + 1, out);
        }
        Op::Sort { input, keys } => {
            line(out, depth, &format!("Sort({} keys)", keys.len()));
            describe(input, depth + 1, out);
        }
        Op::Dedup { input } => {
            line(out, depth, "Dedup");
            describe(input, depth + 1, out);
        }
        Op::Paginate { input, .. } => {
            line(out, depth, "Paginate");
            describe(input, depth + 1, out);
        }
        Op::Unwind { input, alias, .. } => {
            line(out, depth, &format!("Unwind({alias})"));
            describe(input, depth + 1, out);
        }
        Op::CallProcedure { input, name, .. } => {
            line(out, depth, &format!("Call({name})"));
            describe(input, depth + 1, out);
        }
        Op::Subquery { input, body } => {
            line(out, depth, "Subquery");
            describe(body, depth + 1, out);
            describe(input, depth + 1, out);
        }
        Op::Union {
            left,
            right,
            distinct,
        } => {
            line(
                out,
                depth,
                if *distinct { "Union" } else { "UnionAll" },
            );
            describe(left, depth + 1, out);
            describe(right, depth + 1, out);
        }
        Op::Create { input, patterns } => {
            line(out, depth, &format!("Create({} patterns)", patterns.len()));
            describe(input, depth + 1, out);
        }
        Op::Merge { input, .. } => {
            line(out, depth, "Merge");
            describe(input, depth + 1, out);
        }
        Op::SetValues { input, .. } => {
            line(out, depth, "Set");
            describe(input, depth + 1, out);
        }
        Op::RemoveValues { input, .. } => {
            line(out, depth, "Remove");
            describe(input, depth + 1, out);
        }
        Op::Delete { input, detach, .. } => {
            line(out, depth, if *detach { "DetachDelete" } else { "Delete" });
            describe(input, depth + 1, out);
        }
        Op::Foreach { input, body, .. } => {
            line(out, depth, "Foreach");
            describe(body, depth + 1, out);
            describe(input, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render;
    use crate::parser::Parser;

    #[test]
    fn renders_one_operator_per_line() {
        let query = Parser::parse("MATCH (n:Person) RETURN n.name AS name").unwrap();
        let compiled = super::super::compiler::compile_statement(&query).unwrap();
        let plan = render(&compiled.op);
        assert!(plan.contains("LabelScan"), "{plan}");
        assert!(plan.contains("Project"), "{plan}");
    }
}
