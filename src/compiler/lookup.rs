//! Lookup table - deduplicated value lookups for one component.
//!
//! Every distinct [`Expr`] gets exactly one [`LookupKey`] and one compiled
//! function. During a patch pass each key is evaluated at most once; the
//! result is memoised in a [`LookupMemo`] slot.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::compiler::expr::Expr;
use crate::runtime::Scope;
use crate::types::Value;

/// Index into a component's lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupKey(pub(crate) usize);

impl LookupKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A pure `(props, instance) -> value` function.
pub type LookupFn = Rc<dyn Fn(&Scope<'_>) -> Value>;

#[derive(Default)]
pub struct LookupTable {
    exprs: Vec<Expr>,
    functions: Vec<LookupFn>,
    keys: HashMap<Expr, LookupKey>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key for `expr`, adding it if this is its first use.
    pub fn intern(&mut self, expr: &Expr) -> LookupKey {
        if let Some(key) = self.keys.get(expr) {
            return *key;
        }
        let key = LookupKey(self.exprs.len());
        let owned = expr.clone();
        self.functions
            .push(Rc::new(move |scope: &Scope<'_>| owned.eval(scope)));
        self.exprs.push(expr.clone());
        self.keys.insert(expr.clone(), key);
        key
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn expr(&self, key: LookupKey) -> &Expr {
        &self.exprs[key.0]
    }

    pub fn function(&self, key: LookupKey) -> &LookupFn {
        &self.functions[key.0]
    }

    pub fn evaluate(&self, key: LookupKey, scope: &Scope<'_>) -> Value {
        (self.functions[key.0])(scope)
    }
}

impl fmt::Debug for LookupTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.exprs.iter()).finish()
    }
}

/// Per-pass evaluation slots, one per lookup key.
#[derive(Debug)]
pub struct LookupMemo {
    slots: Vec<Option<Value>>,
    evaluations: usize,
}

impl LookupMemo {
    pub fn new(table: &LookupTable) -> Self {
        Self {
            slots: vec![None; table.len()],
            evaluations: 0,
        }
    }

    pub fn evaluate(&mut self, table: &LookupTable, key: LookupKey, scope: &Scope<'_>) -> Value {
        if let Some(value) = &self.slots[key.0] {
            return value.clone();
        }
        let value = table.evaluate(key, scope);
        self.evaluations += 1;
        self.slots[key.0] = Some(value.clone());
        value
    }

    /// How many lookup functions actually ran.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MethodTable;

    #[test]
    fn test_intern_deduplicates() {
        let mut table = LookupTable::new();
        let a = table.intern(&Expr::prop("name"));
        let b = table.intern(&Expr::prop("count"));
        let c = table.intern(&Expr::prop("name"));

        assert_eq!(a, c, "equal expressions share one key");
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_memo_evaluates_once_per_pass() {
        let mut table = LookupTable::new();
        let key = table.intern(&Expr::prop("name"));

        let props = Value::map([("name", Value::from("ada"))]);
        let state = Value::Null;
        let methods = MethodTable::default();
        let scope = Scope::new(&props, &state, None, &methods);

        let mut memo = LookupMemo::new(&table);
        assert_eq!(memo.evaluate(&table, key, &scope), Value::from("ada"));
        assert_eq!(memo.evaluate(&table, key, &scope), Value::from("ada"));
        assert_eq!(memo.evaluations(), 1);
    }
}
