use super::{
    apply, builtin_rules, find_method, hook_call, Error, HookSymbol, InsertionStrategy, Settings,
    SlotStrategy, TargetIdentity,
};
use crate::jvm::code::InsnIndex;
use crate::jvm::model::CompiledType;
use crate::jvm::verifier::analyze_stack;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;

/// One method to patch, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRule {
    pub identity: TargetIdentity,
    pub slots: SlotStrategy,
    pub insertion: InsertionStrategy,
    pub hook: HookSymbol,
}

impl PatchRule {
    /// Make a rule, checking that the hook takes what the slot strategy passes it
    pub fn new(
        identity: TargetIdentity,
        slots: SlotStrategy,
        insertion: InsertionStrategy,
        hook: HookSymbol,
    ) -> Result<PatchRule, Error> {
        let expected_parameters = match slots {
            SlotStrategy::NoArgument => 0,
            SlotStrategy::Fixed(_) | SlotStrategy::Lookup { .. } => 1,
        };
        let parameters = hook.parsed_descriptor.parameters.len();
        if parameters != expected_parameters {
            return Err(Error::InvalidRule(format!(
                "hook {}.{}{} takes {} parameters, but {} are passed to it",
                hook.owner, hook.name, hook.descriptor.stable, parameters, expected_parameters
            )));
        }
        Ok(PatchRule {
            identity,
            slots,
            insertion,
            hook,
        })
    }
}

/// What happened when a rule was applied to a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The hook call was inserted in front of instruction `index`
    Applied {
        method: String,
        index: InsnIndex,
        slot: Option<u16>,
    },

    /// No method with that name and descriptor
    MethodNotFound { method: String },

    /// No local variable holds the value the hook wants
    SlotUnresolved { method: String },

    /// The method has no instruction to anchor the hook call to
    AnchorNotFound { method: String },

    /// The anchor instruction is dead code
    AnchorUnreachable { method: String },

    /// The edited method could not be encoded (eg. a jump no longer fits)
    EncodingFailed { method: String, reason: String },
}

impl PatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchOutcome::Applied { .. })
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied {
                method,
                index,
                slot: Some(slot),
            } => write!(
                f,
                "patched {} before instruction {} (passing slot {})",
                method, index.0, slot
            ),
            PatchOutcome::Applied {
                method,
                index,
                slot: None,
            } => write!(f, "patched {} before instruction {}", method, index.0),
            PatchOutcome::MethodNotFound { method } => write!(f, "{} not found", method),
            PatchOutcome::SlotUnresolved { method } => {
                write!(f, "{}: no local variable to pass to the hook", method)
            }
            PatchOutcome::AnchorNotFound { method } => {
                write!(f, "{}: no place to insert the hook call", method)
            }
            PatchOutcome::AnchorUnreachable { method } => {
                write!(f, "{}: insertion point is unreachable", method)
            }
            PatchOutcome::EncodingFailed { method, reason } => {
                write!(f, "{}: could not encode patched method ({})", method, reason)
            }
        }
    }
}

/// Rules, grouped by the stable binary name of the type they apply to
///
/// Built once before any class is transformed and never changed afterwards.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, Vec<PatchRule>>,
}

impl RuleTable {
    pub fn new() -> RuleTable {
        RuleTable::default()
    }

    /// Table with all of the built-in rules
    pub fn builtin(settings: &Settings) -> Result<RuleTable, Error> {
        let mut table = RuleTable::new();
        for rule in builtin_rules(settings)? {
            table.add(rule);
        }
        Ok(table)
    }

    /// Add a rule after the others for the same type
    pub fn add(&mut self, rule: PatchRule) {
        self.rules
            .entry(rule.identity.type_name.clone())
            .or_default()
            .push(rule);
    }

    /// Rules for a type, given either as `a.b.C` or as `a/b/C`
    pub fn get(&self, type_name: &str) -> Option<&[PatchRule]> {
        self.rules
            .get(&normalize(type_name))
            .map(|rules| rules.as_slice())
    }

    /// All rules, sorted by type
    pub fn iter(&self) -> impl Iterator<Item = &PatchRule> {
        let mut types: Vec<&String> = self.rules.keys().collect();
        types.sort();
        types.into_iter().flat_map(move |name| self.rules[name].iter())
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn normalize(type_name: &str) -> String {
    type_name.replace('.', "/")
}

/// Result of running the rules for a type over a class
#[derive(Debug, Clone)]
pub struct Patched {
    /// Patched class, or the input itself if nothing was patched
    pub bytes: Vec<u8>,

    /// One outcome per rule, in rule order (empty if there were no rules for the type)
    pub outcomes: Vec<PatchOutcome>,
}

/// Entry point for the host's class loading hook
pub struct Transformer {
    rules: RuleTable,
}

impl Transformer {
    /// Transformer running the built-in rules
    pub fn new(settings: &Settings) -> Result<Transformer, Error> {
        Ok(Transformer::with_rules(RuleTable::builtin(settings)?))
    }

    pub fn with_rules(rules: RuleTable) -> Transformer {
        Transformer { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Called by the host for every class it loads
    ///
    /// `name` is the name the class was requested by, `transformed_name` its stable name. When
    /// the two differ, the host is running with obfuscated names.
    pub fn transform_class(
        &self,
        name: &str,
        transformed_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let obfuscated = name != transformed_name;
        self.transform(transformed_name, bytes, obfuscated)
    }

    /// Patch a class, returning the bytes to load instead
    ///
    /// The only error is a class that can't be parsed. Every other problem leaves the class
    /// unchanged.
    pub fn transform(
        &self,
        requested: &str,
        bytes: &[u8],
        obfuscated: bool,
    ) -> Result<Vec<u8>, Error> {
        self.patch(requested, bytes, obfuscated)
            .map(|patched| patched.bytes)
    }

    /// Like [`Self::transform`], but also report what each rule did
    pub fn patch(&self, requested: &str, bytes: &[u8], obfuscated: bool) -> Result<Patched, Error> {
        let rules = match self.rules.get(requested) {
            Some(rules) => rules,
            None => {
                return Ok(Patched {
                    bytes: bytes.to_vec(),
                    outcomes: vec![],
                })
            }
        };

        debug!(
            "{} rule(s) for {} ({} names)",
            rules.len(),
            requested,
            if obfuscated { "obfuscated" } else { "stable" }
        );
        let mut class = CompiledType::parse(bytes)?;
        let mut outcomes: Vec<PatchOutcome> = rules
            .iter()
            .map(|rule| apply_rule(&mut class, rule, obfuscated))
            .collect();

        if !class.is_modified() {
            return Ok(Patched {
                bytes: bytes.to_vec(),
                outcomes,
            });
        }

        match class.to_bytes() {
            Ok(patched) => Ok(Patched {
                bytes: patched,
                outcomes,
            }),
            Err(err) => {
                warn!("could not write patched {}: {}", class.name, err);
                for outcome in &mut outcomes {
                    if let PatchOutcome::Applied { method, .. } = outcome {
                        let method = method.clone();
                        *outcome = PatchOutcome::EncodingFailed {
                            method,
                            reason: err.to_string(),
                        };
                    }
                }
                Ok(Patched {
                    bytes: bytes.to_vec(),
                    outcomes,
                })
            }
        }
    }
}

/// Run one rule, either patching the method completely or not at all
fn apply_rule(class: &mut CompiledType, rule: &PatchRule, obfuscated: bool) -> PatchOutcome {
    let (name, descriptor) = rule.identity.resolve(obfuscated);
    let method = format!("{}.{}{}", class.name, name, descriptor);

    let index = match find_method(class, name, descriptor) {
        Some(index) => index,
        None => {
            warn!("{} not found, skipping", method);
            return PatchOutcome::MethodNotFound { method };
        }
    };
    let body = match &class.methods[index].body {
        Some(body) => body,
        None => {
            warn!("{} has no code, skipping", method);
            return PatchOutcome::AnchorNotFound { method };
        }
    };

    let argument = match rule.slots.resolve(body, obfuscated) {
        Some(argument) => argument,
        None => {
            warn!("{}: could not find the local to pass to the hook", method);
            return PatchOutcome::SlotUnresolved { method };
        }
    };
    let anchor = match rule.insertion.find(body) {
        Some(anchor) => anchor,
        None => {
            warn!("{}: could not find where to insert the hook call", method);
            return PatchOutcome::AnchorNotFound { method };
        }
    };
    debug!("{}: anchor {:?}, argument {:?}", method, anchor, argument);

    match analyze_stack(&body.instructions, &body.exception_table, class.constants()) {
        Ok(depths) if depths.at(anchor).is_some() => (),
        Ok(_) => {
            warn!("{}: instruction {} is unreachable", method, anchor.0);
            return PatchOutcome::AnchorUnreachable { method };
        }
        Err(err) => {
            warn!("{}: {}", method, err);
            return PatchOutcome::EncodingFailed {
                method,
                reason: err.to_string(),
            };
        }
    }

    let mut body = body.clone();
    let mut constants = class.constants().clone();
    let committed = match hook_call(&rule.hook, argument, &mut constants, obfuscated) {
        Ok(call) => {
            apply(&mut body, anchor, call);
            class.commit_method(index, body, constants)
        }
        Err(err) => Err(err),
    };

    match committed {
        Ok(()) => {
            info!(
                "patched {}: {}.{} called before instruction {}",
                method, rule.hook.owner, rule.hook.name, anchor.0
            );
            PatchOutcome::Applied {
                method,
                index: anchor,
                slot: argument.slot(),
            }
        }
        Err(err) => {
            warn!("{}: leaving method unpatched ({})", method, err);
            PatchOutcome::EncodingFailed {
                method,
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::patch::Mappings;

    fn rule(type_name: &str, method: &str) -> PatchRule {
        let mappings = Mappings::new();
        PatchRule::new(
            TargetIdentity::new(&mappings, type_name, method, "()V").unwrap(),
            SlotStrategy::NoArgument,
            InsertionStrategy::BeforeFirstReturn,
            HookSymbol::new(&mappings, "a/Hook", method, "()V").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn lookup_accepts_both_separators() {
        let mut table = RuleTable::new();
        table.add(rule("a.b.C", "first"));
        table.add(rule("a/b/C", "second"));
        table.add(rule("a/D", "third"));

        let rules = table.get("a.b.C").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].identity.method_name.stable, "second");
        assert_eq!(table.get("a/b/C").map(<[_]>::len), Some(2));
        assert!(table.get("a.b.D").is_none());
        assert_eq!(table.len(), 3);
        assert_eq!(
            table
                .iter()
                .map(|rule| rule.identity.method_name.stable.as_str())
                .collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn hook_arity_is_checked() {
        let mappings = Mappings::new();
        let result = PatchRule::new(
            TargetIdentity::new(&mappings, "a.B", "m", "()V").unwrap(),
            SlotStrategy::Fixed(1),
            InsertionStrategy::BeforeFirstReturn,
            HookSymbol::new(&mappings, "a/Hook", "h", "()V").unwrap(),
        );
        assert!(matches!(result, Err(Error::InvalidRule(_))));
    }

    #[test]
    fn unknown_types_pass_through() {
        let transformer = Transformer::with_rules(RuleTable::new());
        let bytes = b"not even a class file".to_vec();
        assert_eq!(transformer.transform("a.B", &bytes, false).unwrap(), bytes);
    }

    #[test]
    fn transformer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Transformer>();
    }
}
