// ==========================================
// 表格批量导入管道 - 分块游标
// ==========================================
// 职责: 在数据行总数上生成连续的行窗口
// 规则:
// - start_row 按 chunk_size 步进，表头行计入步进上界（start_row <= total_rows）
// - 首个窗口从 0 开始，长度 chunk_size + 1（含表头偏移）
// - 后续窗口从 start_row - 1 开始，长度 chunk_size（重读上一窗口末行做边界对齐）
// - 窗口截断到 [0, total_rows)，不产生空窗口
// ==========================================

/// 行窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    /// 窗口起始行（0 基数据行下标）
    pub start_index: usize,
    /// 窗口长度
    pub length: usize,
    /// 窗口开头已被前序窗口覆盖的行数
    pub overlap: usize,
}

impl ChunkWindow {
    /// 窗口结束位置（不含）
    pub fn end(&self) -> usize {
        self.start_index + self.length
    }

    /// 首个未被前序窗口覆盖的行
    pub fn first_new_row(&self) -> usize {
        self.start_index + self.overlap
    }

    /// 新覆盖的行数
    pub fn new_rows(&self) -> usize {
        self.length - self.overlap
    }
}

/// 分块游标（惰性、有限、可重启）
#[derive(Debug, Clone)]
pub struct ChunkCursor {
    total_rows: usize,
    chunk_size: usize,
    next_start_row: usize,
    covered_until: usize,
}

impl ChunkCursor {
    /// 创建游标
    ///
    /// # 参数
    /// - total_rows: 数据行总数（不含表头）
    /// - chunk_size: 分块大小（最小为 1）
    pub fn new(total_rows: usize, chunk_size: usize) -> Self {
        Self {
            total_rows,
            chunk_size: chunk_size.max(1),
            next_start_row: 0,
            covered_until: 0,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 重新从第 0 行开始
    pub fn restart(&mut self) {
        self.next_start_row = 0;
        self.covered_until = 0;
    }
}

impl Iterator for ChunkCursor {
    type Item = ChunkWindow;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // 表头占一行，步进上界为 total_rows + 1
            if self.next_start_row > self.total_rows {
                return None;
            }

            let start_row = self.next_start_row;
            self.next_start_row += self.chunk_size;

            let (start, length) = if start_row == 0 {
                (0, self.chunk_size + 1)
            } else {
                (start_row - 1, self.chunk_size)
            };

            let end = (start + length).min(self.total_rows);
            if start >= end {
                continue;
            }

            let overlap = self.covered_until.saturating_sub(start).min(end - start);
            self.covered_until = self.covered_until.max(end);

            // 完全被覆盖的窗口没有新行
            if overlap == end - start {
                continue;
            }

            return Some(ChunkWindow {
                start_index: start,
                length: end - start,
                overlap,
            });
        }
    }
}
