use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::RwLock;
pub use string_cache::DefaultAtom as Atom;

/// Process-global interner. Ids are dense and stable for the lifetime of
/// the process, so they double as cache slots in the renderer.
struct Interner {
    by_atom: HashMap<Atom, usize>,
    by_id: Vec<Atom>,
}

impl Interner {
    fn intern(&mut self, atom: Atom) -> usize {
        if let Some(&id) = self.by_atom.get(&atom) {
            return id;
        }
        let id = self.by_id.len();
        self.by_id.push(atom.clone());
        self.by_atom.insert(atom, id);
        id
    }
}

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Interner> = RwLock::new(Interner {
        by_atom: HashMap::new(),
        by_id: Vec::new(),
    });
}

/// Intern a string and return its ID
pub fn intern_text(s: &str) -> usize {
    TEXT_INTERNER.write().unwrap().intern(Atom::from(s))
}

/// Current count of unique texts
pub fn text_count() -> usize {
    TEXT_INTERNER.read().unwrap().by_id.len()
}

/// Reverse lookup; `id` must come from `intern_text`
pub fn get_text(id: usize) -> String {
    TEXT_INTERNER.read().unwrap().by_id[id].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let a = intern_text("stimkit-cache-test-a");
        let b = intern_text("stimkit-cache-test-a");
        assert_eq!(a, b);
    }

    #[test]
    fn ids_round_trip() {
        let id = intern_text("stimkit-cache-test-b");
        assert_eq!(get_text(id), "stimkit-cache-test-b");
        assert!(text_count() > id);
    }

    #[test]
    fn distinct_texts_get_distinct_ids() {
        let a = intern_text("stimkit-cache-test-c");
        let b = intern_text("stimkit-cache-test-d");
        assert_ne!(a, b);
    }
}
