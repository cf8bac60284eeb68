use crate::types::Scalar;
use std::collections::HashMap;

/// Hash value — unique field names mapping to scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HashValue {
    data: HashMap<String, Scalar>,
}

impl HashValue {
    pub fn new() -> Self {
        HashValue {
            data: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.data.get(field)
    }

    /// Set a field. Returns true if the field is new.
    pub fn set(&mut self, field: String, value: Scalar) -> bool {
        self.data.insert(field, value).is_none()
    }

    /// Set a field only if absent. Returns true if the field was set.
    pub fn set_if_absent(&mut self, field: String, value: Scalar) -> bool {
        use std::collections::hash_map::Entry;
        match self.data.entry(field) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(value);
                true
            }
        }
    }

    pub fn remove(&mut self, field: &str) -> bool {
        self.data.remove(field).is_some()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    pub fn fields(&self) -> Vec<&String> {
        self.data.keys().collect()
    }

    pub fn values(&self) -> Vec<&Scalar> {
        self.data.values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.data.iter()
    }

    /// Increment a field by an integer delta. Absent fields count as zero;
    /// a non-integer value is an error.
    pub fn incr_by(&mut self, field: &str, delta: i64) -> Result<i64, &'static str> {
        let current = match self.data.get(field) {
            Some(v) => v.as_i64().ok_or("hash value is not an integer")?,
            None => 0,
        };
        let new_val = current
            .checked_add(delta)
            .ok_or("increment or decrement would overflow")?;
        self.data.insert(field.to_string(), Scalar::Int(new_val));
        Ok(new_val)
    }

    /// Increment a field by a float delta. Absent fields count as zero;
    /// a non-numeric value is an error.
    pub fn incr_by_float(&mut self, field: &str, delta: f64) -> Result<f64, &'static str> {
        let current = match self.data.get(field) {
            Some(v) => v.as_f64().ok_or("hash value is not a float")?,
            None => 0.0,
        };
        let new_val = current + delta;
        if new_val.is_nan() || new_val.is_infinite() {
            return Err("increment would produce NaN or Infinity");
        }
        self.data.insert(field.to_string(), Scalar::Float(new_val));
        Ok(new_val)
    }

    /// Sample `count` field names. Positive count returns distinct fields
    /// (all of them when count >= cardinality); negative count permits
    /// repeats and returns exactly |count| fields.
    pub fn random_fields(&self, count: i64) -> Vec<&String> {
        use rand::seq::IteratorRandom;
        let mut rng = rand::thread_rng();

        if count >= 0 {
            let count = (count as usize).min(self.data.len());
            self.data.keys().choose_multiple(&mut rng, count)
        } else {
            let fields: Vec<&String> = self.data.keys().collect();
            if fields.is_empty() {
                return vec![];
            }
            let count = count.unsigned_abs() as usize;
            (0..count)
                .map(|_| {
                    use rand::Rng;
                    fields[rng.gen_range(0..fields.len())]
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut h = HashValue::new();
        assert!(h.set("f1".to_string(), Scalar::Str(b"v1".to_vec())));
        assert!(!h.set("f1".to_string(), Scalar::Str(b"v2".to_vec())));
        assert_eq!(h.get("f1"), Some(&Scalar::Str(b"v2".to_vec())));
    }

    #[test]
    fn test_set_if_absent() {
        let mut h = HashValue::new();
        assert!(h.set_if_absent("f".to_string(), Scalar::Int(1)));
        assert!(!h.set_if_absent("f".to_string(), Scalar::Int(2)));
        assert_eq!(h.get("f"), Some(&Scalar::Int(1)));
    }

    #[test]
    fn test_incr_by() {
        let mut h = HashValue::new();
        assert_eq!(h.incr_by("n", 5), Ok(5));
        assert_eq!(h.incr_by("n", -2), Ok(3));
        h.set("s".to_string(), Scalar::Str(b"abc".to_vec()));
        assert!(h.incr_by("s", 1).is_err());
    }

    #[test]
    fn test_incr_by_float_preserves_sum() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut h = HashValue::new();
        let mut expected = 0.0f64;
        for _ in 0..100 {
            let delta: f64 = rng.gen_range(-10.0..10.0);
            expected += delta;
            let got = h.incr_by_float("acc", delta).unwrap();
            assert!((got - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_random_fields() {
        let mut h = HashValue::new();
        for i in 0..5 {
            h.set(format!("f{i}"), Scalar::Int(i));
        }
        assert_eq!(h.random_fields(3).len(), 3);
        assert_eq!(h.random_fields(10).len(), 5);
        assert_eq!(h.random_fields(-10).len(), 10);
        let distinct = h.random_fields(5);
        let mut sorted: Vec<_> = distinct.iter().map(|s| s.as_str()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }
}
