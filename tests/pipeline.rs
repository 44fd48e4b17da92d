// 该文件是 Letterbox （信封填充） 项目的一部分。
// tests/pipeline.rs - 前处理到后处理的端到端测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{Rgb, RgbImage};
use letterbox::{
  PipelineError,
  decode::{CONF_THRESHOLD, OutputLayout, decode, resolve_layout},
  frame::BgrImage,
  model::{BBox, Classifier, ModelInfo, Task, TaskOutput, YoloDetector},
  nms::{IOU_THRESHOLD, SuppressionPolicy, non_max_suppression},
  preprocess::{INPUT_H, INPUT_W, Letterbox, preprocess_letterbox},
  tensor::RawOutput,
};

/// 把原图上的框放进检测输出的一行 (布局 A)
fn row_for(letterbox: &Letterbox, bbox: &BBox, objectness: f32, scores: &[f32]) -> Vec<f32> {
  let mapped = letterbox.forward(bbox);
  let mut row = vec![
    (mapped.left + mapped.right) / 2.0,
    (mapped.top + mapped.bottom) / 2.0,
    mapped.width(),
    mapped.height(),
    objectness,
  ];
  row.extend_from_slice(scores);
  row
}

fn detection_major_output(rows: &[Vec<f32>], num_detections: usize) -> RawOutput {
  let attrs = rows[0].len();
  let mut data = vec![0.0f32; num_detections * attrs];
  for (i, row) in rows.iter().enumerate() {
    data[i * attrs..(i + 1) * attrs].copy_from_slice(row);
  }
  RawOutput::from_f32(data, vec![1, num_detections as i64, attrs as i64])
}

fn transpose(output: &RawOutput) -> RawOutput {
  let (dets, attrs) = (output.shape[1] as usize, output.shape[2] as usize);
  let mut data = Vec::with_capacity(dets * attrs);
  for a in 0..attrs {
    for d in 0..dets {
      data.push(output.data[d * attrs + a]);
    }
  }
  RawOutput::new(data, vec![1, attrs as i64, dets as i64])
}

#[test]
fn preprocessed_size_is_fixed_for_any_image() {
  for &(w, h) in &[(1, 1), (639, 641), (1920, 1080), (100, 3000)] {
    let image = BgrImage::from(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
    let tensor = preprocess_letterbox(&image).unwrap();
    assert_eq!(tensor.as_bytes().len(), 3 * 640 * 640 * 4);
    assert_eq!((tensor.width(), tensor.height()), (INPUT_W as usize, INPUT_H as usize));
  }
}

#[test]
fn detections_round_trip_to_original_coordinates() {
  let (img_w, img_h) = (1920u32, 1080u32);
  let letterbox = Letterbox::fit(img_w, img_h);
  let person = BBox::new(100.0, 200.0, 400.0, 900.0);
  let car = BBox::new(1000.0, 500.0, 1800.0, 1000.0);
  let rows = vec![
    row_for(&letterbox, &person, 0.95, &[0.9, 0.05, 0.0]),
    row_for(&letterbox, &car, 0.9, &[0.1, 0.2, 0.85]),
  ];
  let output = detection_major_output(&rows, 16);

  let detector = YoloDetector::new(ModelInfo::yolo_default());
  let TaskOutput::Detections(detections) = detector.postprocess((img_w, img_h), &[output]).unwrap()
  else {
    panic!("expected detections");
  };

  assert_eq!(detections.len(), 2);
  assert_eq!(detections[0].class_id, 0);
  assert_eq!(detections[1].class_id, 2);
  for (det, truth) in detections.iter().zip([person, car]) {
    let (a, b) = (det.bbox.to_rect(), truth.to_rect());
    assert!((a.x - b.x).abs() <= 1);
    assert!((a.y - b.y).abs() <= 1);
    assert!((a.width - b.width).abs() <= 1);
    assert!((a.height - b.height).abs() <= 1);
  }
}

#[test]
fn both_layouts_decode_to_the_same_candidates() {
  let letterbox = Letterbox::fit(800, 600);
  let mut rows = Vec::new();
  for i in 0..5 {
    let x = 50.0 + 120.0 * i as f32;
    rows.push(row_for(
      &letterbox,
      &BBox::new(x, 100.0, x + 80.0, 300.0),
      1.0,
      &[0.6 + 0.05 * i as f32, 0.1],
    ));
  }
  let detection_major = detection_major_output(&rows, 20);
  assert_eq!(
    resolve_layout(&detection_major.shape).unwrap().layout,
    OutputLayout::DetectionMajor
  );

  // 布局 B 没有 objectness，去掉第 5 个属性后再转置
  let stripped: Vec<Vec<f32>> = rows
    .iter()
    .map(|r| [&r[..4], &r[5..]].concat())
    .collect();
  let attribute_major = transpose(&detection_major_output(&stripped, 20));
  assert_eq!(
    resolve_layout(&attribute_major.shape).unwrap().layout,
    OutputLayout::AttributeMajor
  );

  let a = decode(&detection_major, (800, 600), CONF_THRESHOLD).unwrap();
  let b = decode(&attribute_major, (800, 600), CONF_THRESHOLD).unwrap();
  assert_eq!(a.len(), 5);
  assert_eq!(a, b);
}

#[test]
fn overlapping_candidates_collapse_to_the_strongest() {
  let letterbox = Letterbox::fit(640, 640);
  let rows = vec![
    row_for(&letterbox, &BBox::new(100.0, 100.0, 200.0, 200.0), 0.8, &[0.9]),
    row_for(&letterbox, &BBox::new(105.0, 105.0, 205.0, 205.0), 0.99, &[0.99]),
    row_for(&letterbox, &BBox::new(150.0, 100.0, 250.0, 200.0), 0.9, &[0.9]),
  ];
  let output = detection_major_output(&rows, 8);
  let candidates = decode(&output, (640, 640), CONF_THRESHOLD).unwrap();
  let keep = non_max_suppression(
    &candidates,
    CONF_THRESHOLD,
    IOU_THRESHOLD,
    SuppressionPolicy::ClassAgnostic,
  );
  // 第 3 个框与第 2 个框 IoU = 55*95 / (2*10000 - 5225) < 0.4
  assert_eq!(keep, vec![1, 2]);
}

#[test]
fn low_scores_give_empty_detections() {
  let output = RawOutput::from_f32(vec![0.3; 84 * 200], vec![1, 84, 200]);
  let detector = YoloDetector::new(ModelInfo::yolo_default());
  assert_eq!(
    detector.postprocess((640, 480), &[output]).unwrap(),
    TaskOutput::Detections(vec![])
  );
}

#[test]
fn malformed_outputs_fail_without_partial_results() {
  let detector = YoloDetector::new(ModelInfo::yolo_default());
  let flat = RawOutput::from_f32(vec![0.9; 85], vec![1, 85]);
  assert!(matches!(
    detector.postprocess((640, 480), &[flat]),
    Err(PipelineError::UnsupportedInputShape(_))
  ));
}

#[test]
fn classification_ranks_scores() {
  let info: ModelInfo = serde_json::from_str(
    r#"{"input_names":["x"],"input_shapes":[[1,224,224,3]],"input_formats":["FORMAT_NHWC"],"input_types":["F32"]}"#,
  )
  .unwrap();
  let classifier = Classifier::new(info);
  let image = BgrImage::from(RgbImage::from_pixel(64, 48, Rgb([1, 2, 3])));
  let inputs = classifier.preprocess(&[image]).unwrap();
  assert_eq!(inputs[0].len(), 224 * 224 * 3 * 4);

  let output = RawOutput::from_f32(vec![0.9, 0.3, 0.6, 0.2], vec![1, 4]);
  let TaskOutput::Classifications(results) = classifier.postprocess((64, 48), &[output]).unwrap()
  else {
    panic!("expected classifications");
  };
  let pairs: Vec<(u32, f32)> = results
    .iter()
    .map(|c| (c.class_id, c.class_confidence))
    .collect();
  assert_eq!(pairs, vec![(0, 0.9), (2, 0.6)]);
}
