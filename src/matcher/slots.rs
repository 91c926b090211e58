/// 呼び出し元が用意する、サブマッチ位置の書き込み先となる平坦な整数配列。
///
/// ホストのオープン配列のように、次元数と添字の範囲を自分で申告できるものを抽象化します。
/// `regex_run` はこの情報を使って、パターンをコンパイルする前に配列の形を検証します。
pub trait MatchSlots {
    /// 配列の次元数。
    fn dimensions(&self) -> i32;

    /// 要素数。
    fn element_count(&self) -> usize;

    /// 最初の次元の左側 (宣言上の先頭) の添字。
    fn left(&self) -> i32;

    /// 最初の次元の右側 (宣言上の末尾) の添字。
    fn right(&self) -> i32;

    /// 先頭から数えて `index` 番目の要素に書き込みます。
    fn set(&mut self, index: usize, value: i32);
}

impl MatchSlots for [i32] {
    fn dimensions(&self) -> i32 {
        1
    }

    fn element_count(&self) -> usize {
        self.len()
    }

    fn left(&self) -> i32 {
        0
    }

    fn right(&self) -> i32 {
        i32::try_from(self.len()).unwrap_or(i32::MAX) - 1
    }

    fn set(&mut self, index: usize, value: i32) {
        self[index] = value;
    }
}

impl MatchSlots for Vec<i32> {
    fn dimensions(&self) -> i32 {
        1
    }

    fn element_count(&self) -> usize {
        self.len()
    }

    fn left(&self) -> i32 {
        0
    }

    fn right(&self) -> i32 {
        self.as_slice().right()
    }

    fn set(&mut self, index: usize, value: i32) {
        self[index] = value;
    }
}
