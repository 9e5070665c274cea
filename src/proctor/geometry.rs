//! 几何与统计工具

use crate::proctor::types::Point;

pub fn distance(a: &Point, b: &Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// 算术平均，空序列返回 `None`
pub fn mean<'a, I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// 总体方差（除以 N），空序列为 0
pub fn variance<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
    I::IntoIter: Clone,
{
    let iter = values.into_iter();
    let Some(avg) = mean(iter.clone()) else {
        return 0.0;
    };
    let (sq_sum, count) = iter.fold((0.0, 0_usize), |(acc, count), v| {
        (acc + (v - avg).powi(2), count + 1)
    });
    sq_sum / count as f64
}
