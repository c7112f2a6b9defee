//! 16비트 고정 우주(0–65535) 위의 비트셋
//!
//! [`ValueSet`]은 포트 집합과 ICMP type/code 집합의 공통 기반입니다.
//! "비어 있음"과 "가득 참"은 비트맵 없이 표현하여, 연산 결과가 어느 한쪽으로
//! 수렴하면 이후 연산과 비교가 O(1)로 끝나도록 합니다.

use std::fmt;
use std::sync::Arc;

/// 비트맵 워드 수 (1024 * 64 = 65536 비트)
const WORDS: usize = 1024;

/// 우주의 최댓값
pub const MAX_VALUE: u16 = u16::MAX;

type Bitmap = [u64; WORDS];

#[derive(Clone)]
enum Repr {
    Empty,
    Complete,
    /// 최소 한 비트는 켜져 있고 최소 한 비트는 꺼져 있음
    Partial(Arc<Bitmap>),
}

/// 0–65535 값의 불변 집합
///
/// 모든 연산은 새 집합을 반환합니다. 결과가 완전히 비었거나 가득 찼다면
/// 비트맵 경로로 계산했더라도 `Empty`/`Complete` 표현으로 정규화됩니다.
#[derive(Clone)]
pub struct ValueSet {
    repr: Repr,
}

impl ValueSet {
    /// 빈 집합
    pub fn empty() -> Self {
        Self { repr: Repr::Empty }
    }

    /// 전체 집합
    pub fn complete() -> Self {
        Self {
            repr: Repr::Complete,
        }
    }

    /// 단일 값 집합
    pub fn from_value(value: u16) -> Self {
        Self::from_range(value, value)
    }

    /// `[low, high]` 닫힌 구간 집합
    ///
    /// 경계 검증은 호출자 책임입니다. `low > high` 이면 빈 집합을 반환합니다.
    pub fn from_range(low: u16, high: u16) -> Self {
        if low > high {
            return Self::empty();
        }
        if low == 0 && high == MAX_VALUE {
            return Self::complete();
        }

        let mut bits: Bitmap = [0; WORDS];
        let (lw, lb) = (usize::from(low) / 64, u32::from(low) % 64);
        let (hw, hb) = (usize::from(high) / 64, u32::from(high) % 64);

        if lw == hw {
            bits[lw] = word_mask(lb, hb);
        } else {
            bits[lw] = word_mask(lb, 63);
            for word in &mut bits[lw + 1..hw] {
                *word = u64::MAX;
            }
            bits[hw] = word_mask(0, hb);
        }

        Self::from_bitmap(bits)
    }

    fn from_bitmap(bits: Bitmap) -> Self {
        if bits.iter().all(|w| *w == 0) {
            Self::empty()
        } else if bits.iter().all(|w| *w == u64::MAX) {
            Self::complete()
        } else {
            Self {
                repr: Repr::Partial(Arc::new(bits)),
            }
        }
    }

    fn to_bitmap(&self) -> Bitmap {
        match &self.repr {
            Repr::Empty => [0; WORDS],
            Repr::Complete => [u64::MAX; WORDS],
            Repr::Partial(bits) => **bits,
        }
    }

    /// 비어 있는지 (O(1))
    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    /// 전체 집합인지 (O(1))
    pub fn is_complete(&self) -> bool {
        matches!(self.repr, Repr::Complete)
    }

    /// 값 포함 여부
    pub fn contains(&self, value: u16) -> bool {
        match &self.repr {
            Repr::Empty => false,
            Repr::Complete => true,
            Repr::Partial(bits) => {
                bits[usize::from(value) / 64] & (1u64 << (u32::from(value) % 64)) != 0
            }
        }
    }

    /// 합집합
    pub fn union(&self, other: &Self) -> Self {
        match (&self.repr, &other.repr) {
            (Repr::Complete, _) | (_, Repr::Complete) => Self::complete(),
            (Repr::Empty, _) => other.clone(),
            (_, Repr::Empty) => self.clone(),
            (Repr::Partial(a), Repr::Partial(b)) => combine(a, b, |x, y| x | y),
        }
    }

    /// 교집합
    pub fn intersect(&self, other: &Self) -> Self {
        match (&self.repr, &other.repr) {
            (Repr::Empty, _) | (_, Repr::Empty) => Self::empty(),
            (Repr::Complete, _) => other.clone(),
            (_, Repr::Complete) => self.clone(),
            (Repr::Partial(a), Repr::Partial(b)) => combine(a, b, |x, y| x & y),
        }
    }

    /// 차집합 (`self - other`)
    pub fn subtract(&self, other: &Self) -> Self {
        match (&self.repr, &other.repr) {
            (Repr::Empty, _) | (_, Repr::Complete) => Self::empty(),
            (_, Repr::Empty) => self.clone(),
            (Repr::Complete, _) => other.invert(),
            (Repr::Partial(a), Repr::Partial(b)) => combine(a, b, |x, y| x & !y),
        }
    }

    /// 여집합
    pub fn invert(&self) -> Self {
        match &self.repr {
            Repr::Empty => Self::complete(),
            Repr::Complete => Self::empty(),
            Repr::Partial(bits) => {
                let mut out = **bits;
                for word in &mut out {
                    *word = !*word;
                }
                Self::from_bitmap(out)
            }
        }
    }

    /// 포함된 값 개수
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::Complete => usize::from(MAX_VALUE) + 1,
            Repr::Partial(bits) => bits.iter().map(|w| w.count_ones() as usize).sum(),
        }
    }

    /// 오름차순 값 이터레이터. 호출할 때마다 처음부터 다시 순회합니다.
    pub fn iter(&self) -> Values<'_> {
        Values {
            set: self,
            next: 0,
        }
    }

    /// 연속 구간 목록 `(low, high)` (오름차순)
    pub fn ranges(&self) -> Vec<(u16, u16)> {
        match &self.repr {
            Repr::Empty => Vec::new(),
            Repr::Complete => vec![(0, MAX_VALUE)],
            Repr::Partial(_) => {
                let mut out: Vec<(u16, u16)> = Vec::new();
                for value in self.iter() {
                    match out.last_mut() {
                        Some((_, high)) if u32::from(*high) + 1 == u32::from(value) => {
                            *high = value;
                        }
                        _ => out.push((value, value)),
                    }
                }
                out
            }
        }
    }
}

/// `lo..=hi` 비트가 켜진 마스크 (0 <= lo <= hi <= 63)
fn word_mask(lo: u32, hi: u32) -> u64 {
    (u64::MAX >> (63 - hi)) & (u64::MAX << lo)
}

fn combine(a: &Bitmap, b: &Bitmap, op: impl Fn(u64, u64) -> u64) -> ValueSet {
    let mut out: Bitmap = [0; WORDS];
    for (i, word) in out.iter_mut().enumerate() {
        *word = op(a[i], b[i]);
    }
    ValueSet::from_bitmap(out)
}

impl Default for ValueSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Empty, Repr::Empty) | (Repr::Complete, Repr::Complete) => true,
            (Repr::Partial(a), Repr::Partial(b)) => Arc::ptr_eq(a, b) || a[..] == b[..],
            _ => false,
        }
    }
}

impl Eq for ValueSet {}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Empty => f.write_str("ValueSet(empty)"),
            Repr::Complete => f.write_str("ValueSet(complete)"),
            Repr::Partial(_) => f.debug_tuple("ValueSet").field(&self.ranges()).finish(),
        }
    }
}

impl FromIterator<u16> for ValueSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut bits: Bitmap = [0; WORDS];
        for value in iter {
            bits[usize::from(value) / 64] |= 1u64 << (u32::from(value) % 64);
        }
        Self::from_bitmap(bits)
    }
}

/// [`ValueSet::iter`] 이터레이터
pub struct Values<'a> {
    set: &'a ValueSet,
    next: u32,
}

impl Iterator for Values<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        while self.next <= u32::from(MAX_VALUE) {
            match &self.set.repr {
                Repr::Empty => return None,
                Repr::Complete => {
                    let value = self.next;
                    self.next += 1;
                    return u16::try_from(value).ok();
                }
                Repr::Partial(bits) => {
                    let idx = (self.next / 64) as usize;
                    let word = bits[idx] >> (self.next % 64);
                    if word == 0 {
                        // 남은 비트가 없으면 다음 워드로
                        self.next = (idx as u32 + 1) * 64;
                        continue;
                    }
                    let value = self.next + word.trailing_zeros();
                    self.next = value + 1;
                    return u16::try_from(value).ok();
                }
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = u16;
    type IntoIter = Values<'a>;

    fn into_iter(self) -> Values<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_is_complete_not_bitmap() {
        let set = ValueSet::from_range(0, MAX_VALUE);
        assert!(set.is_complete());
        assert_eq!(set, ValueSet::complete());
    }

    #[test]
    fn range_within_single_word() {
        let set = ValueSet::from_range(3, 9);
        assert_eq!(set.ranges(), vec![(3, 9)]);
        assert!(!set.contains(2));
        assert!(set.contains(3));
        assert!(set.contains(9));
        assert!(!set.contains(10));
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn range_spanning_many_words() {
        let set = ValueSet::from_range(60, 1000);
        assert_eq!(set.ranges(), vec![(60, 1000)]);
        assert_eq!(set.len(), 941);
        assert!(set.contains(64));
        assert!(set.contains(127));
        assert!(!set.contains(1001));
    }

    #[test]
    fn range_on_word_boundaries() {
        let set = ValueSet::from_range(64, 127);
        assert_eq!(set.ranges(), vec![(64, 127)]);
        let top = ValueSet::from_range(65472, MAX_VALUE);
        assert_eq!(top.ranges(), vec![(65472, MAX_VALUE)]);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(ValueSet::from_range(10, 5).is_empty());
    }

    #[test]
    fn union_of_halves_normalizes_to_complete() {
        let low = ValueSet::from_range(0, 30000);
        let high = ValueSet::from_range(30001, MAX_VALUE);
        assert!(low.union(&high).is_complete());
    }

    #[test]
    fn intersect_disjoint_normalizes_to_empty() {
        let a = ValueSet::from_range(0, 99);
        let b = ValueSet::from_range(100, 200);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn subtract_from_complete_inverts() {
        let hole = ValueSet::from_range(22, 22);
        let rest = ValueSet::complete().subtract(&hole);
        assert_eq!(rest.ranges(), vec![(0, 21), (23, MAX_VALUE)]);
    }

    #[test]
    fn subtract_self_is_empty() {
        let set = ValueSet::from_range(1000, 2000);
        assert!(set.subtract(&set).is_empty());
    }

    #[test]
    fn iteration_is_restartable() {
        let set: ValueSet = [5u16, 70, 65535].into_iter().collect();
        let first: Vec<u16> = set.iter().collect();
        let second: Vec<u16> = set.iter().collect();
        assert_eq!(first, vec![5, 70, 65535]);
        assert_eq!(first, second);
    }

    #[test]
    fn complete_iterates_every_value() {
        assert_eq!(ValueSet::complete().iter().count(), 65536);
        assert_eq!(ValueSet::empty().iter().count(), 0);
    }

    #[test]
    fn equality_across_construction_paths() {
        let a = ValueSet::from_range(10, 12);
        let b: ValueSet = [10u16, 11, 12].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, ValueSet::empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn range() -> impl Strategy<Value = (u16, u16)> {
            (any::<u16>(), any::<u16>()).prop_map(|(a, b)| (a.min(b), a.max(b)))
        }

        proptest! {
            #[test]
            fn intersect_of_ranges_is_overlap((a, b) in range(), (c, d) in range()) {
                let got = ValueSet::from_range(a, b).intersect(&ValueSet::from_range(c, d));
                let (lo, hi) = (a.max(c), b.min(d));
                if lo > hi {
                    prop_assert!(got.is_empty());
                } else {
                    prop_assert_eq!(got, ValueSet::from_range(lo, hi));
                }
            }

            #[test]
            fn double_invert_is_identity((a, b) in range(), (c, d) in range()) {
                let set = ValueSet::from_range(a, b).union(&ValueSet::from_range(c, d));
                prop_assert_eq!(set.invert().invert(), set);
            }

            #[test]
            fn algebra_identities((a, b) in range()) {
                let set = ValueSet::from_range(a, b);
                prop_assert!(set.union(&ValueSet::complete()).is_complete());
                prop_assert!(set.intersect(&ValueSet::empty()).is_empty());
                prop_assert!(set.subtract(&set).is_empty());
            }

            #[test]
            fn union_and_intersect_commute((a, b) in range(), (c, d) in range()) {
                let x = ValueSet::from_range(a, b);
                let y = ValueSet::from_range(c, d);
                prop_assert_eq!(x.union(&y), y.union(&x));
                prop_assert_eq!(x.intersect(&y), y.intersect(&x));
            }
        }
    }
}
