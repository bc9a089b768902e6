use super::positions::{LineIndex, Span};
use super::locate;
use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use std::collections::HashSet;
use std::sync::Arc;
use tree_sitter::Node;

type Result<T> = std::result::Result<T, ParseError>;

/// Lowers the tree-sitter concrete tree into [`crate::ast`].
pub(super) struct TreeBuilder<'a> {
    source: &'a str,
    name: Arc<str>,
    lines: &'a LineIndex,
    mentions: HashSet<String>,
}

fn span(node: Node<'_>) -> Span {
    let range = node.byte_range();
    Span::new(range.start, range.end)
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn all_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor)
        .filter(|child| child.is_named())
        .collect()
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    all_children(node)
        .iter()
        .any(|child| !child.is_named() && child.kind() == token)
}

fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    all_children(node).into_iter().find_map(first_error)
}

fn is_type_kind(kind: &str) -> bool {
    matches!(
        kind,
        "slice_type"
            | "array_type"
            | "implicit_length_array_type"
            | "map_type"
            | "channel_type"
            | "pointer_type"
            | "function_type"
            | "struct_type"
            | "interface_type"
            | "qualified_type"
            | "generic_type"
            | "parenthesized_type"
            | "negated_type"
    )
}

impl<'a> TreeBuilder<'a> {
    pub fn new(source: &'a str, name: Arc<str>, lines: &'a LineIndex) -> Self {
        Self {
            source,
            name,
            lines,
            mentions: HashSet::new(),
        }
    }

    pub fn build(mut self, root: Node<'_>) -> Result<(File, HashSet<String>)> {
        let top = named_children(root);
        let Some(first) = top.first().copied() else {
            return Err(self.error(
                ParseErrorKind::MissingPackage,
                "expected 'package', found 'EOF'",
                Span::at(self.source.len()),
            ));
        };
        if first.kind() != "package_clause"
            && !(first.is_error() && self.leading_token(first) == "package")
        {
            return Err(self.error(
                ParseErrorKind::MissingPackage,
                format!("expected 'package', found '{}'", self.leading_token(first)),
                span(first),
            )
            .with_help("every Go file starts with a package clause, e.g. `package main`"));
        }
        if let Some(bad) = first_error(root) {
            return Err(self.syntax_error(bad));
        }

        let package = named_children(first)
            .into_iter()
            .find(|child| matches!(child.kind(), "package_identifier" | "identifier"))
            .map(|node| self.ident(node))
            .ok_or_else(|| {
                self.error(
                    ParseErrorKind::Syntax,
                    "syntax error: package clause without a name",
                    span(first),
                )
            })?;

        let mut imports = Vec::new();
        let mut decls = Vec::new();
        for node in top.iter().skip(1).copied() {
            match node.kind() {
                "import_declaration" => {
                    if !decls.is_empty() {
                        return Err(self.error(
                            ParseErrorKind::Misplaced,
                            "imports must appear before other declarations",
                            span(node),
                        ));
                    }
                    self.lower_imports(node, &mut imports)?;
                }
                "function_declaration" | "method_declaration" => {
                    decls.push(Decl::Func(self.lower_func(node)?));
                }
                "const_declaration" | "var_declaration" | "type_declaration" => {
                    decls.push(self.lower_decl(node)?);
                }
                "package_clause" => {
                    return Err(self.error(
                        ParseErrorKind::Syntax,
                        "syntax error: expected declaration, found 'package'",
                        span(node),
                    ));
                }
                _ => {
                    return Err(self.error(
                        ParseErrorKind::Misplaced,
                        "non-declaration statement outside function body",
                        span(node),
                    ));
                }
            }
        }

        let file = File {
            package,
            imports,
            decls,
            span: span(root),
        };
        Ok((file, self.mentions))
    }

    fn error(&self, kind: ParseErrorKind, message: impl Into<String>, at: Span) -> ParseError {
        ParseError::new(kind, message, locate(&self.name, self.lines, at))
    }

    fn syntax_error(&self, node: Node<'_>) -> ParseError {
        if node.is_missing() {
            return self.error(
                ParseErrorKind::Syntax,
                format!("syntax error: expected '{}'", node.kind()),
                span(node),
            );
        }
        let token = self.leading_token(node);
        self.error(
            ParseErrorKind::Syntax,
            format!("syntax error: unexpected {}", token),
            span(node),
        )
    }

    /// Text of the first leaf under `node`, or `EOF` when there is none.
    fn leading_token(&self, node: Node<'_>) -> String {
        let mut cursor = node.walk();
        while cursor.goto_first_child() {}
        let text = self.text(cursor.node()).trim();
        if text.is_empty() {
            "EOF".to_string()
        } else {
            text.split_whitespace().next().unwrap_or("EOF").to_string()
        }
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }

    fn ident(&self, node: Node<'_>) -> Ident {
        Ident {
            name: self.text(node).to_string(),
            span: span(node),
        }
    }

    fn mention(&mut self, name: &str) {
        if !self.mentions.contains(name) {
            self.mentions.insert(name.to_string());
        }
    }

    fn field<'t>(&self, node: Node<'t>, name: &str) -> Result<Node<'t>> {
        node.child_by_field_name(name).ok_or_else(|| {
            self.error(
                ParseErrorKind::Syntax,
                format!("syntax error: missing {} in {}", name, node.kind()),
                span(node),
            )
        })
    }

    fn only_child<'t>(&self, node: Node<'t>) -> Result<Node<'t>> {
        named_children(node).into_iter().next().ok_or_else(|| {
            self.error(
                ParseErrorKind::Syntax,
                format!("syntax error: empty {}", node.kind()),
                span(node),
            )
        })
    }

    // ---- declarations ----

    fn lower_imports(&mut self, node: Node<'_>, out: &mut Vec<ImportSpec>) -> Result<()> {
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => out.push(self.lower_import_spec(child)?),
                "import_spec_list" => {
                    for spec in named_children(child) {
                        if spec.kind() == "import_spec" {
                            out.push(self.lower_import_spec(spec)?);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn lower_import_spec(&mut self, node: Node<'_>) -> Result<ImportSpec> {
        let path = unquote(self.text(self.field(node, "path")?));
        let name = node.child_by_field_name("name").map(|name| match name.kind() {
            "dot" => ImportName::Dot(span(name)),
            "blank_identifier" => ImportName::Blank(span(name)),
            _ => ImportName::Named(self.ident(name)),
        });
        Ok(ImportSpec {
            name,
            path,
            span: span(node),
        })
    }

    fn lower_decl(&mut self, node: Node<'_>) -> Result<Decl> {
        match node.kind() {
            "const_declaration" => {
                let mut specs = Vec::new();
                for (iota, spec) in named_children(node)
                    .into_iter()
                    .filter(|child| child.kind() == "const_spec")
                    .enumerate()
                {
                    specs.push(self.lower_value_spec(spec, iota as u64)?);
                }
                Ok(Decl::Const(specs))
            }
            "var_declaration" => {
                let mut specs = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "var_spec" => specs.push(self.lower_value_spec(child, 0)?),
                        "var_spec_list" => {
                            for spec in named_children(child) {
                                if spec.kind() == "var_spec" {
                                    specs.push(self.lower_value_spec(spec, 0)?);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Decl::Var(specs))
            }
            _ => {
                let mut specs = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "type_spec" => specs.push(self.lower_type_spec(child, false)?),
                        "type_alias" => specs.push(self.lower_type_spec(child, true)?),
                        _ => {}
                    }
                }
                Ok(Decl::Type(specs))
            }
        }
    }

    fn lower_value_spec(&mut self, node: Node<'_>, iota: u64) -> Result<ValueSpec> {
        let names = field_children(node, "name")
            .into_iter()
            .map(|name| self.ident(name))
            .collect();
        let ty = match node.child_by_field_name("type") {
            Some(ty) => Some(self.lower_type(ty)?),
            None => None,
        };
        let values = match node.child_by_field_name("value") {
            Some(list) => self.lower_expr_list(list)?,
            None => Vec::new(),
        };
        Ok(ValueSpec {
            implicit: values.is_empty() && ty.is_none(),
            names,
            ty,
            values,
            iota,
            span: span(node),
        })
    }

    fn lower_type_spec(&mut self, node: Node<'_>, alias: bool) -> Result<TypeSpec> {
        let name = self.ident(self.field(node, "name")?);
        let type_params = match node.child_by_field_name("type_parameters") {
            Some(list) => self.lower_type_params(list)?,
            None => Vec::new(),
        };
        let ty = self.lower_type(self.field(node, "type")?)?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
            span: span(node),
        })
    }

    fn lower_type_params(&mut self, list: Node<'_>) -> Result<Vec<TypeParam>> {
        let mut params = Vec::new();
        for decl in named_children(list) {
            let names = field_children(decl, "name")
                .into_iter()
                .map(|name| self.ident(name))
                .collect();
            let constraint = self.lower_type(self.field(decl, "type")?)?;
            params.push(TypeParam { names, constraint });
        }
        Ok(params)
    }

    fn lower_func(&mut self, node: Node<'_>) -> Result<FuncDecl> {
        let name = self.ident(self.field(node, "name")?);
        let recv = match node.child_by_field_name("receiver") {
            Some(list) => Some(self.lower_receiver(list)?),
            None => None,
        };
        let type_params = match node.child_by_field_name("type_parameters") {
            Some(list) => self.lower_type_params(list)?,
            None => Vec::new(),
        };
        let sig = self.lower_signature(node)?;
        let body = match node.child_by_field_name("body") {
            Some(body) => Some(self.lower_block(body)?),
            None => None,
        };
        Ok(FuncDecl {
            recv,
            name,
            type_params,
            sig,
            body,
            span: span(node),
        })
    }

    fn lower_receiver(&mut self, list: Node<'_>) -> Result<Receiver> {
        let decls: Vec<_> = named_children(list)
            .into_iter()
            .filter(|child| child.kind() == "parameter_declaration")
            .collect();
        let [decl] = decls.as_slice() else {
            let message = if decls.is_empty() {
                "method has no receiver"
            } else {
                "method has multiple receivers"
            };
            return Err(self.error(ParseErrorKind::Syntax, message, span(list)));
        };
        let name = decl.child_by_field_name("name").map(|name| self.ident(name));

        let mut ty = self.field(*decl, "type")?;
        let mut pointer = false;
        loop {
            match ty.kind() {
                "parenthesized_type" => ty = self.only_child(ty)?,
                "pointer_type" if !pointer => {
                    pointer = true;
                    ty = self.only_child(ty)?;
                }
                _ => break,
            }
        }

        let (base, type_params) = match ty.kind() {
            "type_identifier" | "identifier" => (self.ident(ty), Vec::new()),
            "generic_type" => {
                let base = self.field(ty, "type")?;
                let mut params = Vec::new();
                if let Some(args) = ty.child_by_field_name("type_arguments") {
                    for arg in named_children(args) {
                        let arg = if arg.kind() == "type_elem" {
                            self.only_child(arg)?
                        } else {
                            arg
                        };
                        params.push(self.ident(arg));
                    }
                }
                (self.ident(base), params)
            }
            _ => {
                return Err(self.error(
                    ParseErrorKind::Syntax,
                    format!("invalid receiver type {}", self.text(ty)),
                    span(ty),
                ));
            }
        };

        Ok(Receiver {
            name,
            pointer,
            base,
            type_params,
            span: span(*decl),
        })
    }

    /// Parameters and results of a function, method, literal or function type.
    fn lower_signature(&mut self, node: Node<'_>) -> Result<Signature> {
        let (params, variadic) = self.lower_params(self.field(node, "parameters")?)?;
        let results = match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => self.lower_params(result)?.0,
            Some(result) => vec![Param {
                name: None,
                ty: self.lower_type(result)?,
            }],
            None => Vec::new(),
        };
        Ok(Signature {
            params,
            results,
            variadic,
        })
    }

    fn lower_params(&mut self, list: Node<'_>) -> Result<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        for decl in named_children(list) {
            match decl.kind() {
                "parameter_declaration" => {
                    let ty = self.lower_type(self.field(decl, "type")?)?;
                    let names = field_children(decl, "name");
                    if names.is_empty() {
                        params.push(Param { name: None, ty });
                    } else {
                        for name in names {
                            params.push(Param {
                                name: Some(self.ident(name)),
                                ty: ty.clone(),
                            });
                        }
                    }
                }
                "variadic_parameter_declaration" => {
                    variadic = true;
                    params.push(Param {
                        name: decl.child_by_field_name("name").map(|name| self.ident(name)),
                        ty: self.lower_type(self.field(decl, "type")?)?,
                    });
                }
                _ => {}
            }
        }
        Ok((params, variadic))
    }

    // ---- types ----

    fn lower_type(&mut self, node: Node<'_>) -> Result<TypeExpr> {
        let kind = match node.kind() {
            "type_identifier" | "identifier" | "nil" => TypeExprKind::Name(self.ident(node)),
            "qualified_type" => {
                let package = self.ident(self.field(node, "package")?);
                self.mention(&package.name);
                TypeExprKind::Qualified {
                    package,
                    name: self.ident(self.field(node, "name")?),
                }
            }
            // `pkg.T` reached through an expression position
            "selector_expression" => {
                let operand = self.field(node, "operand")?;
                if operand.kind() != "identifier" {
                    return Err(self.error(
                        ParseErrorKind::Syntax,
                        format!("{} is not a type", self.text(node)),
                        span(node),
                    ));
                }
                let package = self.ident(operand);
                self.mention(&package.name);
                TypeExprKind::Qualified {
                    package,
                    name: self.ident(self.field(node, "field")?),
                }
            }
            "generic_type" => {
                let base = self.lower_type(self.field(node, "type")?)?;
                let mut args = Vec::new();
                if let Some(list) = node.child_by_field_name("type_arguments") {
                    for arg in named_children(list) {
                        args.push(self.lower_type(arg)?);
                    }
                }
                TypeExprKind::Generic {
                    base: Box::new(base),
                    args,
                }
            }
            "pointer_type" => TypeExprKind::Pointer(Box::new(self.lower_type(self.only_child(node)?)?)),
            "parenthesized_type" => return self.lower_type(self.only_child(node)?),
            "slice_type" => {
                TypeExprKind::Slice(Box::new(self.lower_type(self.field(node, "element")?)?))
            }
            "array_type" => TypeExprKind::Array {
                len: Some(Box::new(self.lower_expr(self.field(node, "length")?)?)),
                elem: Box::new(self.lower_type(self.field(node, "element")?)?),
            },
            "implicit_length_array_type" => TypeExprKind::Array {
                len: None,
                elem: Box::new(self.lower_type(self.field(node, "element")?)?),
            },
            "map_type" => TypeExprKind::Map {
                key: Box::new(self.lower_type(self.field(node, "key")?)?),
                value: Box::new(self.lower_type(self.field(node, "value")?)?),
            },
            "channel_type" => TypeExprKind::Chan {
                dir: chan_dir(node),
                elem: Box::new(self.lower_type(self.field(node, "value")?)?),
            },
            "function_type" => TypeExprKind::Func(Box::new(self.lower_signature(node)?)),
            "struct_type" => TypeExprKind::Struct(self.lower_fields(node)?),
            "interface_type" => TypeExprKind::Interface(self.lower_interface(node)?),
            "negated_type" => TypeExprKind::Tilde(Box::new(self.lower_type(self.only_child(node)?)?)),
            "type_elem" | "type_constraint" | "constraint_elem" => {
                let mut terms = Vec::new();
                for term in named_children(node) {
                    terms.push(self.lower_type(term)?);
                }
                if terms.len() == 1 {
                    return Ok(terms.remove(0));
                }
                TypeExprKind::Union(terms)
            }
            other => {
                return Err(self.error(
                    ParseErrorKind::Syntax,
                    format!("syntax error: unexpected {} in type", other),
                    span(node),
                ));
            }
        };
        Ok(TypeExpr::new(kind, span(node)))
    }

    fn lower_fields(&mut self, node: Node<'_>) -> Result<Vec<FieldDecl>> {
        let mut fields = Vec::new();
        for list in named_children(node) {
            if list.kind() != "field_declaration_list" {
                continue;
            }
            for decl in named_children(list) {
                if decl.kind() != "field_declaration" {
                    continue;
                }
                let names: Vec<Ident> = field_children(decl, "name")
                    .into_iter()
                    .map(|name| self.ident(name))
                    .collect();
                let ty = self.lower_type(self.field(decl, "type")?)?;
                let embedded_pointer = names.is_empty() && has_token(decl, "*");
                let tag = decl
                    .child_by_field_name("tag")
                    .map(|tag| unquote(self.text(tag)));
                fields.push(FieldDecl {
                    names,
                    ty,
                    embedded_pointer,
                    tag,
                });
            }
        }
        Ok(fields)
    }

    fn lower_interface(&mut self, node: Node<'_>) -> Result<Vec<InterfaceElem>> {
        let mut elems = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "method_elem" | "method_spec" => elems.push(InterfaceElem::Method {
                    name: self.ident(self.field(child, "name")?),
                    sig: self.lower_signature(child)?,
                }),
                "interface_type_name" => {
                    elems.push(InterfaceElem::Embed(self.lower_type(self.only_child(child)?)?))
                }
                _ => elems.push(InterfaceElem::Embed(self.lower_type(child)?)),
            }
        }
        Ok(elems)
    }

    // ---- statements ----

    fn lower_block(&mut self, node: Node<'_>) -> Result<Block> {
        Ok(Block {
            stmts: self.lower_stmts(node, &[])?,
            span: span(node),
        })
    }

    /// Statements under `node`, skipping the children listed in `skip`.
    fn lower_stmts(&mut self, node: Node<'_>, skip: &[usize]) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        for child in named_children(node) {
            if skip.contains(&child.id()) {
                continue;
            }
            if child.kind() == "statement_list" {
                stmts.extend(self.lower_stmts(child, &[])?);
            } else {
                stmts.push(self.lower_stmt(child)?);
            }
        }
        Ok(stmts)
    }

    fn lower_opt_stmt(&mut self, node: Node<'_>, field: &str) -> Result<Option<Box<Stmt>>> {
        match node.child_by_field_name(field) {
            Some(child) => Ok(Some(Box::new(self.lower_stmt(child)?))),
            None => Ok(None),
        }
    }

    fn lower_stmt(&mut self, node: Node<'_>) -> Result<Stmt> {
        let stmt = match node.kind() {
            "empty_statement" => Stmt::Empty,
            "expression_statement" => Stmt::Expr(self.lower_expr(self.only_child(node)?)?),
            "const_declaration" | "var_declaration" | "type_declaration" => {
                Stmt::Decl(self.lower_decl(node)?)
            }
            "short_var_declaration" => {
                let names = self.lower_names(self.field(node, "left")?)?;
                Stmt::ShortVar {
                    names,
                    values: self.lower_expr_list(self.field(node, "right")?)?,
                    span: span(node),
                }
            }
            "assignment_statement" => {
                let operator = self.text(self.field(node, "operator")?);
                let op = match operator.strip_suffix('=') {
                    Some("") | None => None,
                    Some(token) => BinaryOp::from_token(token),
                };
                Stmt::Assign {
                    lhs: self.lower_expr_list(self.field(node, "left")?)?,
                    op,
                    rhs: self.lower_expr_list(self.field(node, "right")?)?,
                }
            }
            "inc_statement" | "dec_statement" => Stmt::IncDec(self.lower_expr(self.only_child(node)?)?),
            "send_statement" => Stmt::Send {
                chan: self.lower_expr(self.field(node, "channel")?)?,
                value: self.lower_expr(self.field(node, "value")?)?,
            },
            "receive_statement" => {
                let value = self.lower_expr(self.field(node, "right")?)?;
                match node.child_by_field_name("left") {
                    Some(left) if has_token(node, ":=") => Stmt::ShortVar {
                        names: self.lower_names(left)?,
                        values: vec![value],
                        span: span(node),
                    },
                    Some(left) => Stmt::Assign {
                        lhs: self.lower_expr_list(left)?,
                        op: None,
                        rhs: vec![value],
                    },
                    None => Stmt::Expr(value),
                }
            }
            "go_statement" => Stmt::Go(self.lower_expr(self.only_child(node)?)?),
            "defer_statement" => Stmt::Defer(self.lower_expr(self.only_child(node)?)?),
            "return_statement" => match named_children(node).first() {
                Some(list) => Stmt::Return(self.lower_expr_list(*list)?),
                None => Stmt::Return(Vec::new()),
            },
            "break_statement" | "continue_statement" | "goto_statement" | "fallthrough_statement" => {
                Stmt::Branch
            }
            "labeled_statement" | "empty_labeled_statement" => {
                let label = node.child_by_field_name("label").map(|label| label.id());
                let inner = named_children(node)
                    .into_iter()
                    .find(|child| Some(child.id()) != label && child.kind() != "label_name");
                match inner {
                    Some(inner) => Stmt::Labeled(Box::new(self.lower_stmt(inner)?)),
                    None => Stmt::Labeled(Box::new(Stmt::Empty)),
                }
            }
            "block" => Stmt::Block(self.lower_block(node)?),
            "if_statement" => Stmt::If {
                init: self.lower_opt_stmt(node, "initializer")?,
                cond: self.lower_expr(self.field(node, "condition")?)?,
                then: self.lower_block(self.field(node, "consequence")?)?,
                els: self.lower_opt_stmt(node, "alternative")?,
            },
            "for_statement" => self.lower_for(node)?,
            "expression_switch_statement" => {
                let mut clauses = Vec::new();
                for case in named_children(node) {
                    match case.kind() {
                        "expression_case" => {
                            let value = self.field(case, "value")?;
                            clauses.push(CaseClause {
                                exprs: self.lower_expr_list(value)?,
                                body: self.lower_stmts(case, &[value.id()])?,
                            });
                        }
                        "default_case" => clauses.push(CaseClause {
                            exprs: Vec::new(),
                            body: self.lower_stmts(case, &[])?,
                        }),
                        _ => {}
                    }
                }
                Stmt::Switch {
                    init: self.lower_opt_stmt(node, "initializer")?,
                    tag: match node.child_by_field_name("value") {
                        Some(value) => Some(self.lower_expr(value)?),
                        None => None,
                    },
                    clauses,
                }
            }
            "type_switch_statement" => self.lower_type_switch(node)?,
            "select_statement" => {
                let mut clauses = Vec::new();
                for case in named_children(node) {
                    match case.kind() {
                        "communication_case" => {
                            let comm = self.field(case, "communication")?;
                            clauses.push(CommClause {
                                comm: Some(Box::new(self.lower_stmt(comm)?)),
                                body: self.lower_stmts(case, &[comm.id()])?,
                            });
                        }
                        "default_case" => clauses.push(CommClause {
                            comm: None,
                            body: self.lower_stmts(case, &[])?,
                        }),
                        _ => {}
                    }
                }
                Stmt::Select(clauses)
            }
            _ => Stmt::Opaque(Vec::new()),
        };
        Ok(stmt)
    }

    /// Left side of `:=`: every operand must be a plain identifier.
    fn lower_names(&mut self, list: Node<'_>) -> Result<Vec<Ident>> {
        let items = if list.kind() == "expression_list" {
            named_children(list)
        } else {
            vec![list]
        };
        items
            .into_iter()
            .map(|item| {
                if item.kind() == "identifier" {
                    Ok(self.ident(item))
                } else {
                    Err(self.error(
                        ParseErrorKind::Syntax,
                        format!("non-name {} on left side of :=", self.text(item)),
                        span(item),
                    ))
                }
            })
            .collect()
    }

    fn lower_for(&mut self, node: Node<'_>) -> Result<Stmt> {
        let body_node = self.field(node, "body")?;
        let header = named_children(node)
            .into_iter()
            .find(|child| child.id() != body_node.id());
        let body = self.lower_block(body_node)?;

        let Some(header) = header else {
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
            });
        };
        match header.kind() {
            "for_clause" => Ok(Stmt::For {
                init: self.lower_opt_stmt(header, "initializer")?,
                cond: match header.child_by_field_name("condition") {
                    Some(cond) => Some(self.lower_expr(cond)?),
                    None => None,
                },
                post: self.lower_opt_stmt(header, "update")?,
                body,
            }),
            "range_clause" => {
                let mut targets = match header.child_by_field_name("left") {
                    Some(left) => self.lower_expr_list(left)?.into_iter(),
                    None => Vec::new().into_iter(),
                };
                Ok(Stmt::Range {
                    key: targets.next(),
                    value: targets.next(),
                    define: has_token(header, ":="),
                    expr: self.lower_expr(self.field(header, "right")?)?,
                    body,
                })
            }
            _ => Ok(Stmt::For {
                init: None,
                cond: Some(self.lower_expr(header)?),
                post: None,
                body,
            }),
        }
    }

    fn lower_type_switch(&mut self, node: Node<'_>) -> Result<Stmt> {
        let binding = match node.child_by_field_name("alias") {
            Some(alias) => self.lower_names(alias)?.into_iter().next(),
            None => None,
        };
        let mut clauses = Vec::new();
        for case in named_children(node) {
            match case.kind() {
                "type_case" => {
                    let type_nodes = field_children(case, "type");
                    let skip: Vec<usize> = type_nodes.iter().map(|ty| ty.id()).collect();
                    let mut types = Vec::new();
                    for ty in type_nodes {
                        types.push(self.lower_type(ty)?);
                    }
                    clauses.push(TypeClause {
                        types,
                        body: self.lower_stmts(case, &skip)?,
                    });
                }
                "default_case" => clauses.push(TypeClause {
                    types: Vec::new(),
                    body: self.lower_stmts(case, &[])?,
                }),
                _ => {}
            }
        }
        Ok(Stmt::TypeSwitch {
            init: self.lower_opt_stmt(node, "initializer")?,
            binding,
            subject: self.lower_expr(self.field(node, "value")?)?,
            clauses,
        })
    }

    // ---- expressions ----

    fn lower_expr_list(&mut self, node: Node<'_>) -> Result<Vec<Expr>> {
        if node.kind() != "expression_list" {
            return Ok(vec![self.lower_expr(node)?]);
        }
        named_children(node)
            .into_iter()
            .map(|child| self.lower_expr(child))
            .collect()
    }

    fn lower_opt_expr(&mut self, node: Node<'_>, field: &str) -> Result<Option<Box<Expr>>> {
        match node.child_by_field_name(field) {
            Some(child) => Ok(Some(Box::new(self.lower_expr(child)?))),
            None => Ok(None),
        }
    }

    fn lower_expr(&mut self, node: Node<'_>) -> Result<Expr> {
        let kind = match node.kind() {
            "identifier" | "type_identifier" | "field_identifier" | "package_identifier" | "nil"
            | "true" | "false" | "iota" => ExprKind::Ident(self.ident(node)),
            "int_literal" => self.literal(node, LitKind::Int),
            "float_literal" => self.literal(node, LitKind::Float),
            "imaginary_literal" => self.literal(node, LitKind::Imag),
            "rune_literal" => self.literal(node, LitKind::Rune),
            "raw_string_literal" | "interpreted_string_literal" => self.literal(node, LitKind::String),
            "parenthesized_expression" => {
                ExprKind::Paren(Box::new(self.lower_expr(self.only_child(node)?)?))
            }
            "selector_expression" => {
                let operand = self.lower_expr(self.field(node, "operand")?)?;
                if let ExprKind::Ident(ident) = &operand.kind {
                    let name = ident.name.clone();
                    self.mention(&name);
                }
                ExprKind::Selector {
                    operand: Box::new(operand),
                    field: self.ident(self.field(node, "field")?),
                }
            }
            "index_expression" => {
                let operand = self.lower_expr(self.field(node, "operand")?)?;
                let mut indices = Vec::new();
                for index in field_children(node, "index") {
                    indices.push(self.lower_expr(index)?);
                }
                ExprKind::Index {
                    operand: Box::new(operand),
                    indices,
                }
            }
            "type_instantiation_expression" => {
                let base = self.field(node, "type")?;
                let operand = self.lower_expr(base)?;
                let mut indices = Vec::new();
                for arg in named_children(node) {
                    if arg.id() == base.id() {
                        continue;
                    }
                    let ty = self.lower_type(arg)?;
                    indices.push(Expr::new(ExprKind::Type(ty), span(arg)));
                }
                ExprKind::Index {
                    operand: Box::new(operand),
                    indices,
                }
            }
            "slice_expression" => ExprKind::Slice {
                operand: Box::new(self.lower_expr(self.field(node, "operand")?)?),
                low: self.lower_opt_expr(node, "start")?,
                high: self.lower_opt_expr(node, "end")?,
                max: self.lower_opt_expr(node, "capacity")?,
            },
            "type_assertion_expression" => ExprKind::TypeAssert {
                operand: Box::new(self.lower_expr(self.field(node, "operand")?)?),
                ty: Some(self.lower_type(self.field(node, "type")?)?),
            },
            "type_conversion_expression" => {
                let ty_node = self.field(node, "type")?;
                let ty = self.lower_type(ty_node)?;
                ExprKind::Call {
                    func: Box::new(Expr::new(ExprKind::Type(ty), span(ty_node))),
                    type_args: Vec::new(),
                    args: vec![self.lower_expr(self.field(node, "operand")?)?],
                    spread: false,
                }
            }
            "call_expression" => self.lower_call(node)?,
            "composite_literal" => ExprKind::Composite {
                ty: Some(self.lower_type(self.field(node, "type")?)?),
                elems: self.lower_literal_value(self.field(node, "body")?)?,
            },
            "literal_value" => ExprKind::Composite {
                ty: None,
                elems: self.lower_literal_value(node)?,
            },
            "func_literal" => ExprKind::FuncLit {
                sig: Box::new(self.lower_signature(node)?),
                body: self.lower_block(self.field(node, "body")?)?,
            },
            "unary_expression" => {
                let operator = self.field(node, "operator")?;
                let op = UnaryOp::from_token(self.text(operator)).ok_or_else(|| {
                    self.error(
                        ParseErrorKind::Syntax,
                        format!("syntax error: unknown operator {}", self.text(operator)),
                        span(operator),
                    )
                })?;
                ExprKind::Unary {
                    op,
                    operand: Box::new(self.lower_expr(self.field(node, "operand")?)?),
                }
            }
            "binary_expression" => {
                let operator = self.field(node, "operator")?;
                let op = BinaryOp::from_token(self.text(operator)).ok_or_else(|| {
                    self.error(
                        ParseErrorKind::Syntax,
                        format!("syntax error: unknown operator {}", self.text(operator)),
                        span(operator),
                    )
                })?;
                ExprKind::Binary {
                    op,
                    lhs: Box::new(self.lower_expr(self.field(node, "left")?)?),
                    rhs: Box::new(self.lower_expr(self.field(node, "right")?)?),
                }
            }
            kind if is_type_kind(kind) => ExprKind::Type(self.lower_type(node)?),
            _ => ExprKind::Opaque(Vec::new()),
        };
        Ok(Expr::new(kind, span(node)))
    }

    fn literal(&self, node: Node<'_>, kind: LitKind) -> ExprKind {
        ExprKind::BasicLit {
            kind,
            raw: self.text(node).to_string(),
        }
    }

    fn lower_call(&mut self, node: Node<'_>) -> Result<ExprKind> {
        let func = self.lower_expr(self.field(node, "function")?)?;
        let mut type_args = Vec::new();
        if let Some(list) = node.child_by_field_name("type_arguments") {
            for arg in named_children(list) {
                type_args.push(self.lower_type(arg)?);
            }
        }
        let mut args = Vec::new();
        let mut spread = false;
        for arg in named_children(self.field(node, "arguments")?) {
            if arg.kind() == "variadic_argument" {
                spread = true;
                args.push(self.lower_expr(self.only_child(arg)?)?);
            } else {
                args.push(self.lower_expr(arg)?);
            }
        }
        Ok(ExprKind::Call {
            func: Box::new(func),
            type_args,
            args,
            spread,
        })
    }

    fn lower_literal_value(&mut self, node: Node<'_>) -> Result<Vec<Element>> {
        let mut elems = Vec::new();
        for child in named_children(node) {
            if child.kind() == "keyed_element" {
                let parts = named_children(child);
                let key = match child.child_by_field_name("key").or(parts.first().copied()) {
                    Some(key) => self.lower_element_value(key)?,
                    None => continue,
                };
                let value = match child.child_by_field_name("value").or(parts.get(1).copied()) {
                    Some(value) => self.lower_element_value(value)?,
                    None => continue,
                };
                elems.push(Element {
                    key: Some(key),
                    value,
                });
            } else {
                elems.push(Element {
                    key: None,
                    value: self.lower_element_value(child)?,
                });
            }
        }
        Ok(elems)
    }

    fn lower_element_value(&mut self, node: Node<'_>) -> Result<ElementValue> {
        match node.kind() {
            "literal_element" => self.lower_element_value(self.only_child(node)?),
            "literal_value" => Ok(ElementValue::Literal(
                self.lower_literal_value(node)?,
                span(node),
            )),
            _ => Ok(ElementValue::Expr(self.lower_expr(node)?)),
        }
    }
}

fn chan_dir(node: Node<'_>) -> ChanDir {
    let tokens: Vec<&str> = all_children(node)
        .into_iter()
        .filter(|child| !child.is_named())
        .map(|child| child.kind())
        .collect();
    match tokens.first() {
        Some(&"<-") => ChanDir::Recv,
        _ if tokens.contains(&"<-") => ChanDir::Send,
        _ => ChanDir::Both,
    }
}

/// Decode a Go string or rune literal, quotes included.
pub fn unquote(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return inner.replace('\r', "");
    }
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next() {
            Some('a') => Some('\u{7}'),
            Some('b') => Some('\u{8}'),
            Some('f') => Some('\u{c}'),
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('v') => Some('\u{b}'),
            Some('x') => digits(&mut chars, 2, 16),
            Some('u') => digits(&mut chars, 4, 16),
            Some('U') => digits(&mut chars, 8, 16),
            Some(d @ '0'..='7') => {
                let rest = digits(&mut chars, 2, 8).map(|c| c as u32).unwrap_or(0);
                char::from_u32((d as u32 - '0' as u32) * 64 + rest)
            }
            Some(other) => Some(other),
            None => Some('\\'),
        };
        out.push(decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    out
}

fn digits(chars: &mut std::str::Chars<'_>, count: usize, radix: u32) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..count {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::unquote;

    #[test]
    fn test_unquote_interpreted() {
        assert_eq!(unquote("\"fmt\""), "fmt");
        assert_eq!(unquote(r#""a\tb\n""#), "a\tb\n");
        assert_eq!(unquote(r#""é\x41""#), "éA");
        assert_eq!(unquote(r#""\101""#), "A");
    }

    #[test]
    fn test_unquote_raw() {
        assert_eq!(unquote("`json:\"x\"`"), "json:\"x\"");
        assert_eq!(unquote("`a\r\nb`"), "a\nb");
    }

    #[test]
    fn test_unquote_rune() {
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote(r"'\n'"), "\n");
        assert_eq!(unquote(r"'\''"), "'");
    }
}
