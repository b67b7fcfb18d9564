//! 8-连通区域提取与面积过滤.

use super::neighbour8;
use crate::{Area2d, Areas2d};
use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;

/// 按照 8-相邻规则获取所有前景区域. 两个像素属于同一个区域,
/// 当且仅当存在一条连接二者的 8-相邻前景路径.
///
/// 区域按其第一个像素的行优先顺序排列.
pub fn areas(img: ArrayView2<bool>) -> Areas2d {
    let (height, width) = img.dim();
    let mut ans = Areas2d::new();
    let mut visited = Array2::from_elem((height, width), false);
    let mut bfs_q = VecDeque::with_capacity(8);

    for (pos, &fg) in img.indexed_iter() {
        if !fg || visited[pos] {
            continue;
        }
        visited[pos] = true;
        bfs_q.push_back(pos);
        let mut this_area = Area2d::with_capacity(1);
        while let Some(cur) = bfs_q.pop_front() {
            this_area.push(cur);
            for next in neighbour8(cur) {
                if next.0 < height && next.1 < width && img[next] && !visited[next] {
                    visited[next] = true;
                    bfs_q.push_back(next);
                }
            }
        }
        ans.push(this_area);
    }
    ans
}

/// 删除面积 (像素个数) 小于 `min_area` 的 8-连通前景区域.
///
/// 返回过滤后的图像, 以及被删除的区域个数.
pub fn remove_small_areas(img: ArrayView2<bool>, min_area: usize) -> (Array2<bool>, usize) {
    let mut out = img.to_owned();
    let mut removed = 0;
    for area in areas(img).into_iter().filter(|a| a.len() < min_area) {
        removed += 1;
        for pos in area {
            out[pos] = false;
        }
    }
    (out, removed)
}
