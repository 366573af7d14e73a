use std::collections::HashMap;
use std::hash::Hash;

use bizdesk_core::{CompanyId, TenantOwned};

/// Company-isolated map: a value is only reachable together with its company.
#[derive(Debug, Clone)]
pub struct TenantMap<K, V> {
    inner: HashMap<(CompanyId, K), V>,
}

impl<K, V> Default for TenantMap<K, V> {
    fn default() -> Self {
        Self { inner: HashMap::new() }
    }
}

impl<K, V> TenantMap<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn get(&self, company_id: CompanyId, key: &K) -> Option<&V> {
        self.inner.get(&(company_id, key.clone()))
    }

    pub fn contains(&self, company_id: CompanyId, key: &K) -> bool {
        self.inner.contains_key(&(company_id, key.clone()))
    }

    /// Insert or replace; the company comes from the value itself.
    pub fn put(&mut self, key: K, value: V)
    where
        V: TenantOwned,
    {
        self.inner.insert((value.company_id(), key), value);
    }

    pub fn remove(&mut self, company_id: CompanyId, key: &K) -> Option<V> {
        self.inner.remove(&(company_id, key.clone()))
    }

    pub fn list(&self, company_id: CompanyId) -> impl Iterator<Item = &V> {
        self.inner
            .iter()
            .filter_map(move |((c, _k), v)| if *c == company_id { Some(v) } else { None })
    }

    /// Values across all companies (cross-tenant lookups by user).
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Note {
        company: CompanyId,
        text: &'static str,
    }

    impl TenantOwned for Note {
        fn company_id(&self) -> CompanyId {
            self.company
        }
    }

    #[test]
    fn companies_are_isolated() {
        let a = CompanyId::new();
        let b = CompanyId::new();
        let mut map = TenantMap::default();
        map.put(1u32, Note { company: a, text: "a1" });
        map.put(1u32, Note { company: b, text: "b1" });
        map.put(2u32, Note { company: a, text: "a2" });

        assert_eq!(map.get(a, &1).map(|n| n.text), Some("a1"));
        assert_eq!(map.get(b, &1).map(|n| n.text), Some("b1"));
        assert_eq!(map.list(a).count(), 2);

        assert_eq!(map.remove(a, &2).map(|n| n.text), Some("a2"));
        assert!(!map.contains(a, &2));
        assert_eq!(map.list(b).count(), 1);
    }
}
