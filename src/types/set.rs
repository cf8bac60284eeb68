use std::collections::HashSet;

/// Set value — unordered collection of unique byte-string members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetValue {
    data: HashSet<Vec<u8>>,
}

impl SetValue {
    pub fn new() -> Self {
        SetValue {
            data: HashSet::new(),
        }
    }

    pub fn from_members(data: HashSet<Vec<u8>>) -> Self {
        SetValue { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Add a member. Returns true if the member was new.
    pub fn add(&mut self, member: Vec<u8>) -> bool {
        self.data.insert(member)
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        self.data.remove(member)
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.data.contains(member)
    }

    pub fn members(&self) -> Vec<&Vec<u8>> {
        self.data.iter().collect()
    }

    pub fn union(&self, other: &SetValue) -> SetValue {
        SetValue {
            data: self.data.union(&other.data).cloned().collect(),
        }
    }

    pub fn intersect(&self, other: &SetValue) -> SetValue {
        SetValue {
            data: self.data.intersection(&other.data).cloned().collect(),
        }
    }

    pub fn difference(&self, other: &SetValue) -> SetValue {
        SetValue {
            data: self.data.difference(&other.data).cloned().collect(),
        }
    }

    /// Remove and return up to `count` random members.
    pub fn pop(&mut self, count: usize) -> Vec<Vec<u8>> {
        use rand::seq::IteratorRandom;
        let mut rng = rand::thread_rng();
        let picked: Vec<Vec<u8>> = self
            .data
            .iter()
            .choose_multiple(&mut rng, count.min(self.data.len()))
            .into_iter()
            .cloned()
            .collect();
        for member in &picked {
            self.data.remove(member);
        }
        picked
    }

    /// Sample `count` members. Positive count returns distinct members;
    /// negative count permits repeats.
    pub fn random_members(&self, count: i64) -> Vec<Vec<u8>> {
        use rand::seq::IteratorRandom;
        let mut rng = rand::thread_rng();

        if count >= 0 {
            let count = (count as usize).min(self.data.len());
            self.data
                .iter()
                .choose_multiple(&mut rng, count)
                .into_iter()
                .cloned()
                .collect()
        } else {
            let members: Vec<&Vec<u8>> = self.data.iter().collect();
            if members.is_empty() {
                return vec![];
            }
            let count = count.unsigned_abs() as usize;
            (0..count)
                .map(|_| {
                    use rand::Rng;
                    members[rng.gen_range(0..members.len())].clone()
                })
                .collect()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(items: &[&str]) -> SetValue {
        let mut s = SetValue::new();
        for item in items {
            s.add(item.as_bytes().to_vec());
        }
        s
    }

    #[test]
    fn test_add_remove() {
        let mut s = SetValue::new();
        assert!(s.add(b"a".to_vec()));
        assert!(!s.add(b"a".to_vec()));
        assert!(s.remove(b"a"));
        assert!(!s.remove(b"a"));
    }

    #[test]
    fn test_combinations() {
        let a = set_of(&["a", "b", "c"]);
        let b = set_of(&["b", "c", "d"]);
        assert_eq!(a.union(&b).len(), 4);
        assert_eq!(a.intersect(&b).len(), 2);
        assert_eq!(a.difference(&b).len(), 1);
        assert!(a.difference(&b).contains(b"a"));
    }

    #[test]
    fn test_pop() {
        let mut s = set_of(&["a", "b", "c"]);
        let popped = s.pop(2);
        assert_eq!(popped.len(), 2);
        assert_eq!(s.len(), 1);
        for member in popped {
            assert!(!s.contains(&member));
        }
    }

    #[test]
    fn test_random_members() {
        let s = set_of(&["a", "b", "c"]);
        assert_eq!(s.random_members(2).len(), 2);
        assert_eq!(s.random_members(10).len(), 3);
        assert_eq!(s.random_members(-7).len(), 7);
    }
}
