//! In-memory descriptor index.
//!
//! Three maps: unique `(type, key)` lookups, insertion-ordered group
//! member lists, and per-type decorator chains. Registration-time conflict
//! rules are enforced here, synchronously at `add`. Registration is not
//! thread-safe; `freeze` assigns cache slots and the registry is read-only
//! from then on.

use std::any::TypeId;
use std::collections::HashMap;

use crate::decoration::Decorator;
use crate::descriptor::{Descriptor, OutputRef, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::key::{GroupKey, Key};
use crate::lifetime::Lifetime;

pub(crate) struct Registry {
    descriptors: Vec<Option<Descriptor>>,
    by_key: HashMap<Key, OutputRef>,
    by_group: HashMap<GroupKey, Vec<OutputRef>>,
    decorators: HashMap<TypeId, Vec<Decorator>>,
    pub(crate) singleton_slots: usize,
    pub(crate) scoped_slots: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            by_key: HashMap::new(),
            by_group: HashMap::new(),
            decorators: HashMap::new(),
            singleton_slots: 0,
            scoped_slots: 0,
        }
    }

    /// Adds a descriptor, enforcing the registration conflict rules:
    /// duplicate `(type, key)`, cross-lifetime conflict for the same plain
    /// type, transient-in-group, and key/group mutual exclusion.
    pub(crate) fn add(&mut self, mut descriptor: Descriptor) -> DiResult<usize> {
        if descriptor.key.is_some() && descriptor.group.is_some() {
            return Err(DiError::KeyGroupConflict {
                type_name: descriptor.display_name,
            });
        }
        if descriptor.lifetime == Lifetime::Transient {
            if let Some(grouped) = descriptor.outputs.iter().find_map(|o| o.group) {
                return Err(DiError::TransientInGroup {
                    type_name: descriptor.display_name,
                    group: grouped,
                });
            }
        }
        if descriptor.outputs.is_empty() && !descriptor.effect {
            return Err(DiError::EmptyOutputs {
                type_name: descriptor.display_name,
            });
        }

        let id = self.descriptors.len();
        descriptor.id = id;

        // Uniqueness of every non-group output key, checked before any
        // insert so a failed add leaves the registry untouched.
        for output in descriptor.outputs.iter().filter(|o| o.group.is_none()) {
            if let Some(existing) = self.by_key.get(&output.key) {
                let existing = self.descriptor(existing.desc);
                if !output.key.is_keyed() && existing.lifetime != descriptor.lifetime {
                    return Err(DiError::LifetimeConflict {
                        type_name: output.key.display_name(),
                        existing: existing.lifetime,
                        requested: descriptor.lifetime,
                    });
                }
                return Err(DiError::Duplicate {
                    type_name: output.key.display_name(),
                    key: output.key.service_key(),
                });
            }
        }

        for (index, output) in descriptor.outputs.iter().enumerate() {
            let output_ref = OutputRef { desc: id, output: index };
            match output.group {
                // Group members are resolvable only through the group; they
                // get no `by_key` entries. A descriptor bound to several
                // interfaces joins each interface's group once.
                Some(group) => {
                    let group_key = GroupKey {
                        id: output.key.type_id(),
                        type_name: output.key.display_name(),
                        group,
                    };
                    self.by_group.entry(group_key).or_default().push(output_ref);
                }
                None => {
                    self.by_key.insert(output.key.clone(), output_ref);
                }
            }
        }

        self.descriptors.push(Some(descriptor));
        Ok(id)
    }

    /// Appends a decorator for its target type. Chains apply in
    /// registration order.
    pub(crate) fn add_decorator(&mut self, decorator: Decorator) {
        self.decorators.entry(decorator.ty).or_default().push(decorator);
    }

    pub(crate) fn decorators_for(&self, ty: TypeId) -> &[Decorator] {
        self.decorators.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn descriptor(&self, id: usize) -> &Descriptor {
        self.descriptors[id]
            .as_ref()
            .expect("descriptor was removed")
    }

    pub(crate) fn get(&self, key: &Key) -> Option<(&Descriptor, usize)> {
        let output_ref = self.by_key.get(key)?;
        Some((self.descriptor(output_ref.desc), output_ref.output))
    }

    pub(crate) fn group_members(&self, group_key: &GroupKey) -> &[OutputRef] {
        self.by_group
            .get(group_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn has(&self, key: &Key) -> bool {
        self.by_key.contains_key(key)
    }

    /// Removes the descriptor published under `key` along with every other
    /// output and group membership it owns. Pre-build only.
    pub(crate) fn remove(&mut self, key: &Key) -> bool {
        let Some(output_ref) = self.by_key.get(key).copied() else {
            return false;
        };
        let id = output_ref.desc;
        self.by_key.retain(|_, r| r.desc != id);
        for members in self.by_group.values_mut() {
            members.retain(|r| r.desc != id);
        }
        self.descriptors[id] = None;
        true
    }

    pub(crate) fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .filter_map(|(id, d)| d.as_ref().map(|_| id))
    }

    /// Singleton descriptor ids in registration order, build effects
    /// included.
    pub(crate) fn singleton_ids(&self) -> Vec<usize> {
        self.live_ids()
            .filter(|&id| self.descriptor(id).lifetime == Lifetime::Singleton)
            .collect()
    }

    /// Introspection snapshot of every live registration.
    pub(crate) fn service_descriptors(&self) -> Vec<ServiceDescriptor> {
        let mut out = Vec::new();
        for id in self.live_ids() {
            let descriptor = self.descriptor(id);
            for output in &descriptor.outputs {
                out.push(ServiceDescriptor {
                    key: output.key.clone(),
                    lifetime: descriptor.lifetime,
                    group: output.group,
                });
            }
        }
        out
    }

    /// Assigns cache slots per lifetime. Called once by `build`; the
    /// registry is read-only afterwards.
    pub(crate) fn freeze(&mut self) {
        let mut singleton = 0usize;
        let mut scoped = 0usize;
        for descriptor in self.descriptors.iter_mut().flatten() {
            descriptor.slot = match descriptor.lifetime {
                Lifetime::Singleton => {
                    singleton += 1;
                    Some(singleton - 1)
                }
                Lifetime::Scoped => {
                    scoped += 1;
                    Some(scoped - 1)
                }
                Lifetime::Transient => None,
            };
        }
        self.singleton_slots = singleton;
        self.scoped_slots = scoped;
    }
}
