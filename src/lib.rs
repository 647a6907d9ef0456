// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/lib.rs - 库主文件
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

//! YOLOv5 检测核心：letterbox 预处理、锚框网格解码、置信度过滤与 NMS、
//! 坐标反变换。推理运行时（CPU/GPU/DSP）通过 [`backend::InferenceBackend`]
//! 抽象接入，本库自身不绑定任何具体运行时。

pub mod backend;
pub mod detector;
pub mod geometry;
pub mod image;
pub mod labels;
pub mod output;
