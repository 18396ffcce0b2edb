//! Build-time dependency graph validation.
//!
//! Runs once when the provider is built, before any instance exists:
//! 1. **Completeness** — every required dependency is registered (or is a
//!    built-in); optional dependencies contribute edges only when present.
//! 2. **Acyclicity** — three-colour DFS; a back-edge to an in-progress node
//!    reports the participants in traversal order.
//! 3. **Lifetime compatibility** — captive dependencies (Singleton→Scoped,
//!    Transient→Scoped) are rejected.
//!
//! The DFS finish order doubles as the topological order used for eager
//! singleton construction, so dependencies are always built first.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::context::Context;
use crate::error::{DiError, DiResult};
use crate::key::{GroupKey, Key};
use crate::provider::{Scope, ServiceProvider};
use crate::registry::Registry;
use crate::signature::DepSpec;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

pub(crate) struct GraphValidator<'r> {
    registry: &'r Registry,
    edges: HashMap<usize, Vec<usize>>,
    marks: HashMap<usize, Mark>,
    path: Vec<usize>,
    finish_order: Vec<usize>,
}

/// Types the resolution engine serves from the scope frame when no user
/// registration shadows them.
fn is_builtin(ty: TypeId) -> bool {
    ty == TypeId::of::<Context>()
        || ty == TypeId::of::<Scope>()
        || ty == TypeId::of::<ServiceProvider>()
}

impl<'r> GraphValidator<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            edges: HashMap::new(),
            marks: HashMap::new(),
            path: Vec::new(),
            finish_order: Vec::new(),
        }
    }

    /// Validates the whole graph and returns every descriptor id in
    /// topological (dependency-first) order.
    pub(crate) fn validate(mut self) -> DiResult<Vec<usize>> {
        self.build_edges()?;
        debug!(
            descriptors = self.edges.len(),
            "validating dependency graph"
        );

        let ids: Vec<usize> = self.registry.live_ids().collect();
        for id in ids {
            if self.mark(id) == Mark::Unvisited {
                self.visit(id)?;
            }
        }
        Ok(self.finish_order)
    }

    fn mark(&self, id: usize) -> Mark {
        self.marks.get(&id).copied().unwrap_or(Mark::Unvisited)
    }

    fn build_edges(&mut self) -> DiResult<()> {
        for consumer in self.registry.live_ids().collect::<Vec<_>>() {
            let descriptor = self.registry.descriptor(consumer);
            let mut targets = Vec::new();

            for spec in &descriptor.signature {
                targets.extend(self.targets_of(descriptor.display_name, spec)?);
            }
            // Decorator dependencies count against the descriptors they
            // decorate: the decorator runs inside that construction.
            for output in &descriptor.outputs {
                for decorator in self.registry.decorators_for(output.key.type_id()) {
                    for spec in &decorator.signature {
                        targets.extend(self.targets_of(decorator.type_name, spec)?);
                    }
                }
            }

            for &target in &targets {
                let dependency = self.registry.descriptor(target);
                if !descriptor.lifetime.may_depend_on(dependency.lifetime) {
                    return Err(DiError::CaptiveDependency {
                        consumer: descriptor.display_name,
                        consumer_lifetime: descriptor.lifetime,
                        dependency: dependency.display_name,
                        dependency_lifetime: dependency.lifetime,
                    });
                }
            }
            self.edges.insert(consumer, targets);
        }
        Ok(())
    }

    fn targets_of(&self, consumer: &'static str, spec: &DepSpec) -> DiResult<Vec<usize>> {
        if let Some(group) = spec.group {
            let group_key = GroupKey {
                id: spec.ty,
                type_name: spec.type_name,
                group,
            };
            return Ok(self
                .registry
                .group_members(&group_key)
                .iter()
                .map(|r| r.desc)
                .collect());
        }

        let key = match spec.key {
            Some(k) => Key::Keyed(spec.ty, spec.type_name, k),
            None => Key::Type(spec.ty, spec.type_name),
        };
        match self.registry.get(&key) {
            Some((descriptor, _)) => Ok(vec![descriptor.id]),
            None if spec.optional || is_builtin(spec.ty) => Ok(Vec::new()),
            None => {
                debug!(consumer, dependency = spec.type_name, "missing dependency");
                Err(DiError::NotFound {
                    type_name: spec.type_name,
                    key: spec.key,
                })
            }
        }
    }

    fn visit(&mut self, id: usize) -> DiResult<()> {
        self.marks.insert(id, Mark::InProgress);
        self.path.push(id);

        let targets = self.edges.get(&id).cloned().unwrap_or_default();
        for target in targets {
            match self.mark(target) {
                Mark::Done => {}
                Mark::InProgress => {
                    // Back-edge: report the cycle in traversal order.
                    let start = self
                        .path
                        .iter()
                        .position(|&p| p == target)
                        .unwrap_or(0);
                    let mut names: Vec<&'static str> = self.path[start..]
                        .iter()
                        .map(|&p| self.registry.descriptor(p).display_name)
                        .collect();
                    names.push(self.registry.descriptor(target).display_name);
                    return Err(DiError::CircularDependency { path: names });
                }
                Mark::Unvisited => self.visit(target)?,
            }
        }

        self.path.pop();
        self.marks.insert(id, Mark::Done);
        self.finish_order.push(id);
        Ok(())
    }
}
