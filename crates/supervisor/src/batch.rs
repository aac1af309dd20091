//! Batching
//!
//! Splits a job's full point list into fixed-size chunks and turns each
//! chunk into the `PathRequest` body the device expects (spec §4.6
//! "Batching"): the first chunk carries `reset` and `startPosition`,
//! subsequent chunks do not, and the last chunk carries `endOfJob`.

use polargraph_proto::{JobPoint, PathRequest, PointRequest, StartPosition};

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub fn split_into_batches(points: &[JobPoint], batch_size: usize) -> Vec<Vec<JobPoint>> {
    if points.is_empty() {
        return Vec::new();
    }
    points
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub fn build_path_request(
    batch: &[JobPoint],
    batch_index: usize,
    total_batches: usize,
    start_position: Option<StartPosition>,
    speed: Option<u32>,
) -> PathRequest {
    PathRequest {
        reset: Some(batch_index == 0),
        end_of_job: Some(batch_index + 1 == total_batches),
        speed,
        start_position: if batch_index == 0 { start_position } else { None },
        points: batch
            .iter()
            .map(|p| PointRequest {
                x: p.x,
                y: p.y,
                l1: p.l1,
                l2: p.l2,
                pen_down: p.pen_down,
                speed: p.speed,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64) -> JobPoint {
        JobPoint {
            x: Some(x),
            y: Some(0.0),
            l1: None,
            l2: None,
            pen_down: Some(true),
            speed: None,
        }
    }

    #[test]
    fn splits_into_fixed_size_chunks_with_a_short_final_chunk() {
        let points: Vec<JobPoint> = (0..250).map(|i| point(i as f64)).collect();
        let batches = split_into_batches(&points, 100);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn only_first_batch_carries_reset_and_start_position_only_last_carries_end_of_job() {
        let points: Vec<JobPoint> = (0..3).map(|i| point(i as f64)).collect();
        let batches = split_into_batches(&points, 1);
        let start = Some(StartPosition::default());

        let first = build_path_request(&batches[0], 0, batches.len(), start.clone(), None);
        assert_eq!(first.reset, Some(true));
        assert!(first.start_position.is_some());
        assert_eq!(first.end_of_job, Some(false));

        let middle = build_path_request(&batches[1], 1, batches.len(), start.clone(), None);
        assert_eq!(middle.reset, Some(false));
        assert!(middle.start_position.is_none());

        let last = build_path_request(&batches[2], 2, batches.len(), start, None);
        assert_eq!(last.end_of_job, Some(true));
    }
}
