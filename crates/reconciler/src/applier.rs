use anyhow::{Context as _, Result};
use log::trace;
use vdom::{HostRenderer, Patch};

/// Executes patch sequences against a host, in order, forward only.
///
/// A failing host operation stops the sequence; patches already applied stay
/// applied.
pub struct PatchApplier<'host> {
    host: &'host mut dyn HostRenderer,
    applied: u64,
}

impl<'host> PatchApplier<'host> {
    pub fn new(host: &'host mut dyn HostRenderer) -> Self {
        Self { host, applied: 0 }
    }

    /// Apply `patches`, descending into component boundaries.
    ///
    /// # Errors
    /// Returns the first host error, with the failing patch attached.
    pub fn apply_all(&mut self, patches: &[Patch]) -> Result<()> {
        for patch in patches {
            match patch {
                Patch::MountComponent {
                    instance,
                    name,
                    patches: nested,
                }
                | Patch::UpdateComponent {
                    instance,
                    name,
                    patches: nested,
                } => {
                    trace!(
                        target: "reconciler",
                        "patching {name} {instance}: {} operations",
                        nested.len()
                    );
                    self.apply_all(nested)
                        .with_context(|| format!("while patching component {name} {instance}"))?;
                }
                Patch::UnmountComponent { instance, name } => {
                    trace!(target: "reconciler", "unmounted {name} {instance}");
                }
                operation => {
                    self.host
                        .apply_patch(operation)
                        .with_context(|| format!("host rejected {operation:?}"))?;
                    self.applied = self.applied.saturating_add(1);
                }
            }
        }
        Ok(())
    }

    /// Host operations applied so far.
    #[inline]
    pub const fn applied(&self) -> u64 {
        self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use vdom::{InstanceId, NodeKey};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on_remove: bool,
    }

    impl HostRenderer for Recorder {
        fn create_element(&mut self, node: NodeKey, tag: &str) -> Result<()> {
            self.calls.push(format!("create {tag} {node}"));
            Ok(())
        }
        fn create_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
            self.calls.push(format!("text {text:?} {node}"));
            Ok(())
        }
        fn remove_element(&mut self, node: NodeKey) -> Result<()> {
            if self.fail_on_remove {
                bail!("cannot remove {node}");
            }
            self.calls.push(format!("remove {node}"));
            Ok(())
        }
        fn replace_element(&mut self, old: NodeKey, new: NodeKey) -> Result<()> {
            self.calls.push(format!("replace {old} {new}"));
            Ok(())
        }
        fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<()> {
            self.calls.push(format!("set {node} {name}={value}"));
            Ok(())
        }
        fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()> {
            self.calls.push(format!("unset {node} {name}"));
            Ok(())
        }
        fn insert_child(&mut self, parent: NodeKey, child: NodeKey, index: usize) -> Result<()> {
            self.calls.push(format!("insert {child} into {parent} at {index}"));
            Ok(())
        }
        fn remove_child(&mut self, parent: NodeKey, index: usize) -> Result<()> {
            self.calls.push(format!("remove child {index} of {parent}"));
            Ok(())
        }
        fn move_child(&mut self, parent: NodeKey, from: usize, to: usize) -> Result<()> {
            self.calls.push(format!("move {from}->{to} in {parent}"));
            Ok(())
        }
        fn update_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
            self.calls.push(format!("update {node} {text:?}"));
            Ok(())
        }
        fn attach_root(&mut self, node: NodeKey) -> Result<()> {
            self.calls.push(format!("attach {node}"));
            Ok(())
        }
        fn detach_root(&mut self, node: NodeKey) -> Result<()> {
            self.calls.push(format!("detach {node}"));
            Ok(())
        }
    }

    #[test]
    fn component_patches_are_flattened_in_order() -> Result<()> {
        let mut host = Recorder::default();
        let patches = vec![
            Patch::MountComponent {
                instance: InstanceId(1),
                name: "Greeting".into(),
                patches: vec![
                    Patch::CreateElement { node: NodeKey(1), tag: "span".into() },
                    Patch::CreateText { node: NodeKey(2), text: "Hello".into() },
                    Patch::InsertChild { parent: NodeKey(1), child: NodeKey(2), index: 0 },
                ],
            },
            Patch::AttachRoot { node: NodeKey(1) },
        ];
        let mut applier = PatchApplier::new(&mut host);
        applier.apply_all(&patches)?;
        assert_eq!(applier.applied(), 4);
        assert_eq!(
            host.calls,
            [
                "create span #1",
                "text \"Hello\" #2",
                "insert #2 into #1 at 0",
                "attach #1"
            ]
        );
        Ok(())
    }

    #[test]
    fn host_failure_stops_the_sequence() {
        let mut host = Recorder {
            fail_on_remove: true,
            ..Recorder::default()
        };
        let patches = vec![
            Patch::DetachRoot { node: NodeKey(1) },
            Patch::RemoveElement { node: NodeKey(1) },
            Patch::CreateElement { node: NodeKey(2), tag: "p".into() },
        ];
        let mut applier = PatchApplier::new(&mut host);
        let message = applier
            .apply_all(&patches)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(message.contains("cannot remove #1"), "unexpected error: {message}");
        assert_eq!(applier.applied(), 1);
        assert_eq!(host.calls, ["detach #1"]);
    }
}
