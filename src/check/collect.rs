//! First pass: imports per file, top-level names per package.

use super::{Checker, DeclRef, FileImport, FileScope, Mode, Result};
use crate::ast::{Decl, FuncDecl, Ident, ImportName, ImportSpec};
use crate::check::universe::{self, Universal};
use crate::error::{TypeError, TypeErrorKind};
use crate::types::{guess_package_name, TypedPackage};
use std::sync::Arc;

impl<'a> Checker<'a> {
    pub(super) fn collect(&mut self) -> Result<()> {
        let trees = self.trees;
        for (file, tree) in trees.iter().enumerate() {
            self.file = file;
            if tree.package_name() != self.name {
                if self.mode == Mode::Full {
                    return Err(self.error(
                        TypeErrorKind::PackageMismatch,
                        format!("package {}; expected package {}", tree.package_name(), self.name),
                        tree.file.package.span,
                    ));
                }
                self.files.push(FileScope::default());
                continue;
            }

            let mut scope = FileScope::default();
            for spec in &tree.file.imports {
                self.bind_import(&mut scope, spec)?;
            }
            self.files.push(scope);

            for decl in &tree.file.decls {
                self.collect_decl(file, decl)?;
            }
        }

        if self.mode == Mode::Full {
            self.check_receiver_bases()?;
            self.check_import_collisions()?;
        }
        Ok(())
    }

    fn bind_import(&mut self, scope: &mut FileScope, spec: &ImportSpec) -> Result<()> {
        let package = self.import(spec)?;
        let local = match &spec.name {
            Some(ImportName::Blank(_)) => return Ok(()),
            Some(ImportName::Dot(_)) => {
                scope.dots.push(package);
                return Ok(());
            }
            Some(ImportName::Named(ident)) => ident.name.clone(),
            None => package.name.clone(),
        };
        if scope.imports.contains_key(&local) && self.mode == Mode::Full {
            return Err(self.error(
                TypeErrorKind::Redeclared,
                format!("{} redeclared in this block", local),
                spec.span,
            ));
        }
        scope.imports.entry(local).or_insert(FileImport {
            path: spec.path.clone(),
            package,
        });
        Ok(())
    }

    fn import(&mut self, spec: &ImportSpec) -> Result<Arc<TypedPackage>> {
        let path = spec.path.as_str();
        if let Some(package) = self.packages.get(path) {
            return Ok(package.clone());
        }
        let package = match path {
            "unsafe" => Arc::new(universe::unsafe_package()),
            "C" => Arc::new(TypedPackage::opaque("C", "C")),
            _ if path == self.path => {
                return Err(self.error(TypeErrorKind::Import, "import cycle not allowed", spec.span));
            }
            _ => match (self.mode, self.resolver) {
                (Mode::Full, Some(resolver)) => {
                    let location = self.trees[self.file].location(spec.span);
                    resolver
                        .resolve(path)
                        .map_err(|err| TypeError::import(err, Some(location)))?
                }
                _ => Arc::new(TypedPackage::opaque(path, guess_package_name(path))),
            },
        };
        self.packages.insert(path.to_string(), package.clone());
        Ok(package)
    }

    fn collect_decl(&mut self, file: usize, decl: &'a Decl) -> Result<()> {
        match decl {
            Decl::Type(specs) => {
                for spec in specs {
                    self.declare(&spec.name, DeclRef::Type { file, spec })?;
                }
            }
            Decl::Var(specs) => {
                for spec in specs {
                    for index in 0..spec.names.len() {
                        self.declare(&spec.names[index], DeclRef::Var { file, spec, index })?;
                    }
                }
            }
            Decl::Const(specs) => {
                let mut last = None;
                for spec in specs {
                    if !spec.implicit {
                        last = Some(spec);
                    }
                    let source = last.unwrap_or(spec);
                    for (index, name) in spec.names.iter().enumerate() {
                        let decl = DeclRef::Const {
                            file,
                            name,
                            ty: source.ty.as_ref(),
                            value: source.values.get(index),
                            iota: spec.iota,
                        };
                        self.declare(name, decl)?;
                    }
                }
            }
            Decl::Func(func) => match &func.recv {
                Some(_) => self.collect_method(file, func)?,
                None if func.name.name == "init" => {}
                None => self.declare(&func.name, DeclRef::Func { file, decl: func })?,
            },
        }
        Ok(())
    }

    fn declare(&mut self, ident: &Ident, decl: DeclRef<'a>) -> Result<()> {
        if ident.is_blank() {
            return Ok(());
        }
        if self.decls.contains_key(&ident.name) {
            if self.shallow() {
                return Ok(());
            }
            return Err(self.error(
                TypeErrorKind::Redeclared,
                format!("{} redeclared in this block", ident.name),
                ident.span,
            ));
        }
        self.decls.insert(ident.name.clone(), decl);
        Ok(())
    }

    fn collect_method(&mut self, file: usize, func: &'a FuncDecl) -> Result<()> {
        let Some(recv) = &func.recv else {
            return Ok(());
        };
        if func.name.is_blank() {
            return Ok(());
        }
        let previous = self
            .methods
            .get(&recv.base.name)
            .and_then(|list| list.iter().find(|(_, other)| other.name.name == func.name.name))
            .map(|(other_file, other)| self.trees[*other_file].location(other.name.span));
        if let Some(previous) = previous {
            if self.shallow() {
                return Ok(());
            }
            return Err(self.error(
                TypeErrorKind::Redeclared,
                format!(
                    "method {}.{} already declared at {}",
                    recv.base.name, func.name.name, previous
                ),
                func.name.span,
            ));
        }
        self.methods
            .entry(recv.base.name.clone())
            .or_default()
            .push((file, func));
        Ok(())
    }

    /// Receiver base names must denote types of this package.
    fn check_receiver_bases(&self) -> Result<()> {
        let mut receivers: Vec<(usize, &FuncDecl)> =
            self.methods.values().flatten().copied().collect();
        receivers.sort_by_key(|(file, func)| (*file, func.span.start));

        for (file, func) in receivers {
            let Some(recv) = &func.recv else { continue };
            let base = &recv.base;
            let error = match self.decls.get(&base.name) {
                Some(DeclRef::Type { .. }) => continue,
                Some(_) => (TypeErrorKind::NotAType, format!("{} is not a type", base.name)),
                None => match universe::lookup(&base.name) {
                    Some(Universal::Type(_)) => (
                        TypeErrorKind::InvalidReceiver,
                        format!("cannot define new methods on non-local type {}", base.name),
                    ),
                    Some(_) => (TypeErrorKind::NotAType, format!("{} is not a type", base.name)),
                    None => (TypeErrorKind::Undefined, format!("undefined: {}", base.name)),
                },
            };
            return Err(self.error_in(file, error.0, error.1, base.span));
        }
        Ok(())
    }

    /// A file-scope import name may not also be declared at package level.
    fn check_import_collisions(&self) -> Result<()> {
        for scope in &self.files {
            for (name, import) in &scope.imports {
                if let Some(decl) = self.decls.get(name) {
                    return Err(self.error_in(
                        decl.file(),
                        TypeErrorKind::Redeclared,
                        format!(
                            "{} already declared through import of package {} (\"{}\")",
                            name, import.package.name, import.path
                        ),
                        decl.ident().span,
                    ));
                }
            }
        }
        Ok(())
    }
}
