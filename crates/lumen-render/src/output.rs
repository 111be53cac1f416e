// SPDX-License-Identifier: CEPL-1.0
use lumen_math::OutputTransform;

/// Registry name of a display output global.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    pub id: OutputId,
    pub transform: OutputTransform,
    pub scale: i32,
}

impl Output {
    pub fn new(id: OutputId) -> Self {
        Self { id, transform: OutputTransform::Normal, scale: 1 }
    }
}

/// Every output the compositor has announced, in announcement order.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    outputs: Vec<Output>,
}

impl OutputRegistry {
    /// Returns false when the output is already known.
    pub fn add(&mut self, id: OutputId) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        self.outputs.push(Output::new(id));
        true
    }

    pub fn remove(&mut self, id: OutputId) -> Option<Output> {
        let idx = self.outputs.iter().position(|o| o.id == id)?;
        Some(self.outputs.remove(idx))
    }

    pub fn get(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id == id)
    }

    pub fn set_transform(&mut self, id: OutputId, transform: OutputTransform) -> bool {
        match self.outputs.iter_mut().find(|o| o.id == id) {
            Some(o) => {
                o.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Scales below 1 are raised to 1.
    pub fn set_scale(&mut self, id: OutputId, scale: i32) -> bool {
        match self.outputs.iter_mut().find(|o| o.id == id) {
            Some(o) => {
                o.scale = scale.max(1);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Outputs the window currently overlaps, in the order it entered them.
#[derive(Debug, Default)]
pub struct Membership {
    entered: Vec<OutputId>,
}

impl Membership {
    /// Duplicate enters are ignored and return false.
    pub fn enter(&mut self, id: OutputId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entered.push(id);
        true
    }

    pub fn leave(&mut self, id: OutputId) -> bool {
        let before = self.entered.len();
        self.entered.retain(|e| *e != id);
        before != self.entered.len()
    }

    pub fn contains(&self, id: OutputId) -> bool {
        self.entered.contains(&id)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entered.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> impl Iterator<Item = OutputId> + '_ {
        self.entered.iter().copied()
    }

    /// Entered outputs resolved against `registry`, skipping ones it no longer knows.
    pub fn resolve<'a>(&'a self, registry: &'a OutputRegistry) -> Vec<&'a Output> {
        self.entered.iter().filter_map(|id| registry.get(*id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_duplicates_and_clamps_scale() {
        let mut reg = OutputRegistry::default();
        assert!(reg.add(OutputId(7)));
        assert!(!reg.add(OutputId(7)));
        assert!(reg.set_scale(OutputId(7), 0));
        assert_eq!(reg.get(OutputId(7)).map(|o| o.scale), Some(1));
        assert!(!reg.set_scale(OutputId(8), 2));
        assert_eq!(reg.remove(OutputId(7)).map(|o| o.id), Some(OutputId(7)));
        assert!(reg.is_empty());
    }

    #[test]
    fn membership_keeps_entry_order_without_duplicates() {
        let mut m = Membership::default();
        assert!(m.enter(OutputId(2)));
        assert!(m.enter(OutputId(1)));
        assert!(!m.enter(OutputId(2)));
        assert_eq!(m.ids().collect::<Vec<_>>(), vec![OutputId(2), OutputId(1)]);
        assert!(m.leave(OutputId(2)));
        assert!(!m.leave(OutputId(2)));
        assert_eq!(m.ids().collect::<Vec<_>>(), vec![OutputId(1)]);
    }

    #[test]
    fn membership_resolve_skips_vanished_outputs() {
        let mut reg = OutputRegistry::default();
        reg.add(OutputId(1));
        let mut m = Membership::default();
        m.enter(OutputId(1));
        m.enter(OutputId(9));
        let live: Vec<OutputId> = m.resolve(&reg).iter().map(|o| o.id).collect();
        assert_eq!(live, vec![OutputId(1)]);
    }
}
