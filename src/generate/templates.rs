//! One emitter per method template.

use super::{Bindings, Output, Template};

pub(super) fn emit(template: Template, b: &Bindings, output: &mut Output) {
    match template {
        Template::ForEach => for_each(b, output),
        Template::Map => map(b, output),
        Template::Filter => filter(b, output),
        Template::Reduce => reduce(b, output),
    }
}

/// `(element E, index int, slice T)`
fn callback_params(b: &Bindings) -> String {
    format!("element {}, index int, slice {}", b.slice_of, b.ty)
}

fn range_header(b: &Bindings, output: &mut Output) {
    output.line(1, &format!("for {}, element := range {} {{", b.index, b.recv));
}

fn for_each(b: &Bindings, output: &mut Output) {
    output.line(
        0,
        &format!(
            "func ({} {}) ForEach(cb func({}) error) {{",
            b.recv,
            b.ty,
            callback_params(b)
        ),
    );
    range_header(b, output);
    output.line(2, &format!("if err := cb(element, {}, {}); err != nil {{", b.index, b.recv));
    output.line(3, "return");
    output.line(2, "}");
    output.line(1, "}");
    output.line(0, "}");
}

fn map(b: &Bindings, output: &mut Output) {
    output.line(
        0,
        &format!(
            "func ({} {}) Map(fn func({}) {}) {} {{",
            b.recv,
            b.ty,
            callback_params(b),
            b.slice_of,
            b.ty
        ),
    );
    output.line(1, &format!("out := make({}, 0, len({}))", b.ty, b.recv));
    range_header(b, output);
    output.line(2, &format!("out = append(out, fn(element, {}, {}))", b.index, b.recv));
    output.line(1, "}");
    output.line(1, "return out");
    output.line(0, "}");
}

fn filter(b: &Bindings, output: &mut Output) {
    output.line(
        0,
        &format!(
            "func ({} {}) Filter(keep func({}) bool) {} {{",
            b.recv,
            b.ty,
            callback_params(b),
            b.ty
        ),
    );
    output.line(1, &format!("out := make({}, 0, len({}))", b.ty, b.recv));
    range_header(b, output);
    output.line(2, &format!("if keep(element, {}, {}) {{", b.index, b.recv));
    output.line(3, "out = append(out, element)");
    output.line(2, "}");
    output.line(1, "}");
    output.line(1, "return out");
    output.line(0, "}");
}

fn reduce(b: &Bindings, output: &mut Output) {
    let acc = &b.accumulator;
    output.line(
        0,
        &format!(
            "func ({} {}) Reduce(fn func(acc {}, {}) {}, initial {}) {} {{",
            b.recv,
            b.ty,
            acc,
            callback_params(b),
            acc,
            acc,
            acc
        ),
    );
    output.line(1, "acc := initial");
    range_header(b, output);
    output.line(2, &format!("acc = fn(acc, element, {}, {})", b.index, b.recv));
    output.line(1, "}");
    output.line(1, "return acc");
    output.line(0, "}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Import;

    fn bindings(recv: &str) -> Bindings {
        Bindings {
            package: "demo".into(),
            recv: recv.into(),
            ty: "Users".into(),
            type_params: String::new(),
            slice_of: "*User".into(),
            accumulator: "int".into(),
            imports: Vec::<Import>::new(),
            index: if recv == "i" { "j" } else { "i" },
        }
    }

    fn section(template: Template, b: &Bindings) -> String {
        let mut output = Output::new();
        emit(template, b, &mut output);
        output.finish()
    }

    #[test]
    fn test_map_section() {
        assert_eq!(
            section(Template::Map, &bindings("u")),
            "func (u Users) Map(fn func(element *User, index int, slice Users) *User) Users {\n\
             \tout := make(Users, 0, len(u))\n\
             \tfor i, element := range u {\n\
             \t\tout = append(out, fn(element, i, u))\n\
             \t}\n\
             \treturn out\n\
             }\n"
        );
    }

    #[test]
    fn test_filter_section() {
        assert_eq!(
            section(Template::Filter, &bindings("u")),
            "func (u Users) Filter(keep func(element *User, index int, slice Users) bool) Users {\n\
             \tout := make(Users, 0, len(u))\n\
             \tfor i, element := range u {\n\
             \t\tif keep(element, i, u) {\n\
             \t\t\tout = append(out, element)\n\
             \t\t}\n\
             \t}\n\
             \treturn out\n\
             }\n"
        );
    }

    #[test]
    fn test_reduce_section() {
        assert_eq!(
            section(Template::Reduce, &bindings("i")),
            "func (i Users) Reduce(fn func(acc int, element *User, index int, slice Users) int, initial int) int {\n\
             \tacc := initial\n\
             \tfor j, element := range i {\n\
             \t\tacc = fn(acc, element, j, i)\n\
             \t}\n\
             \treturn acc\n\
             }\n"
        );
    }
}
