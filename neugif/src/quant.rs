//! NeuQuant color quantization.
//!
//! A Kohonen self-organizing map of 256 neurons is trained on a sample of the frame's pixels.
//! The neurons start on a grey ramp, compete for every sampled pixel, and the winner and its
//! neighbours are pulled towards the sample. Learning rate and neighbourhood radius decay over
//! 100 cycles until the network settles into a palette.
//!
//! Anthony Dekker, "Kohonen neural networks for optimal colour quantization", Network:
//! Computation in Neural Systems Vol. 5 (1994) pp 351-367.

use crate::utils::manhattan_distance;
use alloc::vec::Vec;
use itertools::Itertools;
use tracing::{debug, trace};

/// Number of neurons, and the maximum number of palette entries.
pub const NET_SIZE: usize = 256;

/// Smallest accepted sampling factor: train on every pixel.
pub const MIN_SAMPLE_FACTOR: u8 = 1;
/// Largest accepted sampling factor.
pub const MAX_SAMPLE_FACTOR: u8 = 20;

// Strides used to walk the picture. The first one that does not divide the byte length wins.
const PRIMES: [usize; 4] = [499, 491, 487, 503];
// Pictures smaller than this (in bytes) are trained on every pixel.
const MIN_PICTURE_BYTES: usize = 3 * 503;

const MAX_NET_POS: usize = NET_SIZE - 1;
const CYCLES: usize = 100;

// Colors are learned with 4 extra bits of precision.
const NET_BIAS_SHIFT: i32 = 4;

const INT_BIAS_SHIFT: i32 = 16;
const INT_BIAS: i32 = 1 << INT_BIAS_SHIFT;
const GAMMA_SHIFT: i32 = 10;
const BETA_SHIFT: i32 = 10;
const BETA: i32 = INT_BIAS >> BETA_SHIFT;
const BETA_GAMMA: i32 = INT_BIAS << (GAMMA_SHIFT - BETA_SHIFT);

const INIT_RAD: usize = NET_SIZE >> 3;
const RADIUS_BIAS_SHIFT: i32 = 6;
const INIT_RADIUS: f64 = (INIT_RAD << RADIUS_BIAS_SHIFT) as f64;
const RADIUS_DEC: f64 = 30.0;

const INIT_ALPHA: f64 = (1 << 10) as f64;
const RAD_BIAS: usize = 1 << 8;
const ALPHA_RAD_BIAS: f64 = (1 << 18) as f64;

/// A palette of at most 256 distinct colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Builds a table from a list of colors.
    ///
    /// # Panics
    ///
    /// Panics if `colors` is empty or holds more than 256 entries.
    pub fn new(colors: Vec<[u8; 3]>) -> Self {
        assert!(
            !colors.is_empty() && colors.len() <= NET_SIZE,
            "a color table holds 1..=256 colors, got {}",
            colors.len()
        );
        Self { colors }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always `false`, a table holds at least one color.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<[u8; 3]> {
        self.colors.get(usize::from(index)).copied()
    }

    /// Bits of the table size field: the table is written with `2^bits` entries.
    #[inline]
    pub fn bits(&self) -> u8 {
        crate::utils::table_bits(self.len())
    }

    /// Exhaustive nearest-color search. Ties go to the lowest index.
    pub fn nearest(&self, color: [u8; 3]) -> u8 {
        let mut best = 0;
        let mut best_dist = u32::MAX;
        for (i, &entry) in self.colors.iter().enumerate() {
            let dist = manhattan_distance(entry, color);
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best as u8
    }

    /// Drops every color not referenced by `indices` and rewrites `indices` to point into the
    /// smaller table. Surviving colors keep their relative order.
    pub fn retain_used(&mut self, indices: &mut [u8]) {
        let mut used = [false; NET_SIZE];
        for &index in indices.iter() {
            used[usize::from(index)] = true;
        }

        let mut remap = [0u8; NET_SIZE];
        let mut kept = Vec::with_capacity(self.colors.len());
        for (i, &color) in self.colors.iter().enumerate() {
            if used[i] {
                remap[i] = kept.len() as u8;
                kept.push(color);
            }
        }

        if kept.is_empty() || kept.len() == self.colors.len() {
            return;
        }

        for index in indices.iter_mut() {
            *index = remap[usize::from(*index)];
        }
        self.colors = kept;
    }
}

/// Learning-time neuron, in the biased fixed-point color space.
#[derive(Debug, Clone, Copy, Default)]
struct Neuron {
    r: f64,
    g: f64,
    b: f64,
}

impl Neuron {
    #[inline(always)]
    fn distance(&self, [r, g, b]: [f64; 3]) -> f64 {
        abs(self.r - r) + abs(self.g - g) + abs(self.b - b)
    }

    /// Moves the neuron by `amount / scale` of the way towards the target.
    #[inline(always)]
    fn alter(&mut self, amount: f64, scale: f64, [r, g, b]: [f64; 3]) {
        self.r -= amount * (self.r - r) / scale;
        self.g -= amount * (self.g - g) / scale;
        self.b -= amount * (self.b - b) / scale;
    }

    #[inline]
    fn unbias(&self) -> [i32; 3] {
        let channel = |v: f64| ((v as i32) >> NET_BIAS_SHIFT).clamp(0, 255);
        [channel(self.r), channel(self.g), channel(self.b)]
    }
}

#[inline(always)]
fn abs(v: f64) -> f64 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

/// Finalized neuron. `index` is the neuron's position before sorting.
#[derive(Debug, Clone, Copy, Default)]
struct Node {
    r: i32,
    g: i32,
    b: i32,
    index: usize,
}

/// The network while it is learning. Consumed once learning is done.
struct Network<'a> {
    pixels: &'a [u8],
    sample_factor: usize,
    neurons: [Neuron; NET_SIZE],
    bias: [i32; NET_SIZE],
    freq: [i32; NET_SIZE],
    rad_power: [f64; INIT_RAD],
}

impl<'a> Network<'a> {
    fn new(pixels: &'a [u8], sample_factor: usize) -> Self {
        let mut neurons = [Neuron::default(); NET_SIZE];
        for (i, neuron) in neurons.iter_mut().enumerate() {
            let v = ((i << (NET_BIAS_SHIFT + 8)) / NET_SIZE) as f64;
            *neuron = Neuron { r: v, g: v, b: v };
        }

        Self {
            pixels,
            sample_factor,
            neurons,
            bias: [0; NET_SIZE],
            freq: [INT_BIAS / NET_SIZE as i32; NET_SIZE],
            rad_power: [0.0; INIT_RAD],
        }
    }

    /// Sample factor and byte stride of the walk over the picture.
    fn sampling(&self) -> (usize, usize) {
        let len = self.pixels.len();
        if len < MIN_PICTURE_BYTES {
            return (1, 3);
        }

        let prime = PRIMES
            .iter()
            .copied()
            .find(|&prime| len % prime != 0)
            .unwrap_or(PRIMES[PRIMES.len() - 1]);
        (self.sample_factor, 3 * prime)
    }

    fn learn(&mut self) -> usize {
        let len = self.pixels.len();
        let (sample_factor, step) = self.sampling();
        let samples = len / (3 * sample_factor);
        let delta = (samples / CYCLES).max(1);
        let alpha_dec = 30.0 + (sample_factor - 1) as f64 / 3.0;

        let mut alpha = INIT_ALPHA;
        let mut radius = INIT_RADIUS;
        let mut rad = radius_to_rad(radius);
        self.update_rad_power(alpha, rad);

        trace!(samples, step, sample_factor, "training network");

        let mut pos = 0;
        for i in 1..=samples {
            let target = [
                f64::from(self.pixels[pos]) * 16.0,
                f64::from(self.pixels[pos + 1]) * 16.0,
                f64::from(self.pixels[pos + 2]) * 16.0,
            ];

            let winner = self.contest(target);
            self.neurons[winner].alter(alpha, INIT_ALPHA, target);
            if rad != 0 {
                self.alter_neighbours(rad, winner, target);
            }

            pos += step;
            if pos >= len {
                pos -= len;
            }

            if i % delta == 0 {
                alpha -= alpha / alpha_dec;
                radius -= radius / RADIUS_DEC;
                rad = radius_to_rad(radius);
                self.update_rad_power(alpha, rad);
            }
        }

        sample_factor
    }

    fn update_rad_power(&mut self, alpha: f64, rad: usize) {
        let rad_sq = rad * rad;
        for (m, power) in self.rad_power.iter_mut().enumerate().take(rad) {
            *power = alpha * (((rad_sq - m * m) * RAD_BIAS) as f64 / rad_sq as f64);
        }
    }

    /// Finds the neuron closest to `target`, corrected by the frequency bias, and updates the
    /// bias of every neuron.
    fn contest(&mut self, target: [f64; 3]) -> usize {
        let mut best_dist = f64::from(i32::MAX);
        let mut best_bias_dist = best_dist;
        let mut best_pos = 0;
        let mut best_bias_pos = 0;

        for i in 0..NET_SIZE {
            let dist = self.neurons[i].distance(target);
            if dist < best_dist {
                best_dist = dist;
                best_pos = i;
            }

            let bias_dist = dist - f64::from(self.bias[i] >> (INT_BIAS_SHIFT - NET_BIAS_SHIFT));
            if bias_dist < best_bias_dist {
                best_bias_dist = bias_dist;
                best_bias_pos = i;
            }

            let beta_freq = self.freq[i] >> BETA_SHIFT;
            self.freq[i] = self.freq[i].wrapping_sub(beta_freq);
            self.bias[i] = self.bias[i].wrapping_add(beta_freq << GAMMA_SHIFT);
        }

        self.freq[best_pos] = self.freq[best_pos].wrapping_add(BETA);
        self.bias[best_pos] = self.bias[best_pos].wrapping_sub(BETA_GAMMA);

        best_bias_pos
    }

    /// Pulls the neighbours of `center` within `rad` towards `target`, nearer ones harder.
    fn alter_neighbours(&mut self, rad: usize, center: usize, target: [f64; 3]) {
        let lo = (center as isize - rad as isize).max(-1);
        let hi = (center + rad).min(NET_SIZE);

        let mut up = center + 1;
        let mut down = center as isize - 1;
        let mut m = 1;
        while up < hi || down > lo {
            let amount = self.rad_power[m];
            m += 1;
            if up < hi {
                self.neurons[up].alter(amount, ALPHA_RAD_BIAS, target);
                up += 1;
            }
            if down > lo {
                self.neurons[down as usize].alter(amount, ALPHA_RAD_BIAS, target);
                down -= 1;
            }
        }
    }
}

#[inline]
fn radius_to_rad(radius: f64) -> usize {
    let rad = (radius as i32) >> RADIUS_BIAS_SHIFT;
    if rad <= 1 {
        0
    } else {
        rad as usize
    }
}

/// A trained quantizer: the learned palette plus a green-sorted index for nearest-color lookups.
#[derive(Debug, Clone)]
pub struct ColorQuantizer {
    // Sorted ascending by green.
    nodes: [Node; NET_SIZE],
    // First guess for every green value.
    green_index: [usize; 256],
    // Neuron index -> color table index.
    remap: [u8; NET_SIZE],
    table: ColorTable,
    sample_factor: u8,
}

impl ColorQuantizer {
    /// Learns a palette from RGB `pixels` (3 bytes per pixel, trailing partial pixels ignored).
    ///
    /// `sample_factor` is clamped to `1..=20`: 1 trains on every pixel, higher values on fewer
    /// pixels. Pictures below 503 pixels are always trained on every pixel.
    ///
    /// Training is deterministic: identical input gives an identical palette.
    pub fn train(pixels: &[u8], sample_factor: u8) -> Self {
        let pixels = &pixels[..pixels.len() - pixels.len() % 3];
        let sample_factor = sample_factor.clamp(MIN_SAMPLE_FACTOR, MAX_SAMPLE_FACTOR);

        let mut network = Network::new(pixels, usize::from(sample_factor));
        let used_factor = network.learn();

        let mut nodes = [Node::default(); NET_SIZE];
        for (index, (node, neuron)) in nodes.iter_mut().zip(network.neurons.iter()).enumerate() {
            let [r, g, b] = neuron.unbias();
            *node = Node { r, g, b, index };
        }

        let (table, remap) = build_table(&nodes);
        let green_index = sort_by_green(&mut nodes);

        debug!(
            colors = table.len(),
            sample_factor = used_factor,
            "palette learned"
        );

        Self {
            nodes,
            green_index,
            remap,
            table,
            sample_factor: used_factor as u8,
        }
    }

    #[inline]
    pub fn color_table(&self) -> &ColorTable {
        &self.table
    }

    pub fn into_color_table(self) -> ColorTable {
        self.table
    }

    /// The sampling factor training actually used.
    #[inline]
    pub fn sample_factor(&self) -> u8 {
        self.sample_factor
    }

    /// Index of the palette entry nearest to the given color, by Manhattan distance.
    pub fn map(&self, r: u8, g: u8, b: u8) -> u8 {
        let target = [i32::from(r), i32::from(g), i32::from(b)];

        // Larger than any possible distance.
        let mut best_dist = 1000;
        let mut best = 0;

        let mut up = self.green_index[usize::from(g)];
        let mut down = up as isize - 1;

        while up < NET_SIZE || down >= 0 {
            if up < NET_SIZE {
                let node = &self.nodes[up];
                let green_dist = node.g - target[1];
                if green_dist >= best_dist {
                    up = NET_SIZE;
                } else {
                    up += 1;
                    if let Some(dist) = closer(node, target, green_dist.abs(), best_dist) {
                        best_dist = dist;
                        best = node.index;
                    }
                }
            }

            if down >= 0 {
                let node = &self.nodes[down as usize];
                let green_dist = target[1] - node.g;
                if green_dist >= best_dist {
                    down = -1;
                } else {
                    down -= 1;
                    if let Some(dist) = closer(node, target, green_dist.abs(), best_dist) {
                        best_dist = dist;
                        best = node.index;
                    }
                }
            }
        }

        self.remap[best]
    }

    /// Maps every RGB pixel to its palette index, appending to `indices`.
    pub fn index_pixels(&self, pixels: &[u8], indices: &mut Vec<u8>) {
        indices.reserve(pixels.len() / 3);
        indices.extend(
            pixels
                .iter()
                .copied()
                .tuples()
                .map(|(r, g, b)| self.map(r, g, b)),
        );
    }
}

/// Full distance of `node` if it beats `best_dist`, given the already computed green distance.
#[inline(always)]
fn closer(node: &Node, [r, _, b]: [i32; 3], green_dist: i32, best_dist: i32) -> Option<i32> {
    let mut dist = green_dist + (node.r - r).abs();
    if dist >= best_dist {
        return None;
    }
    dist += (node.b - b).abs();
    (dist < best_dist).then_some(dist)
}

/// Collects the distinct colors in neuron order. Returns the table and the neuron -> table
/// index mapping.
fn build_table(nodes: &[Node; NET_SIZE]) -> (ColorTable, [u8; NET_SIZE]) {
    let mut colors: Vec<[u8; 3]> = Vec::with_capacity(NET_SIZE);
    let mut remap = [0u8; NET_SIZE];

    for node in nodes {
        let color = [node.r as u8, node.g as u8, node.b as u8];
        let slot = match colors.iter().position(|&c| c == color) {
            Some(slot) => slot,
            None => {
                colors.push(color);
                colors.len() - 1
            }
        };
        remap[node.index] = slot as u8;
    }

    (ColorTable::new(colors), remap)
}

/// Selection-sorts the nodes by green and builds the green lookup index.
fn sort_by_green(nodes: &mut [Node; NET_SIZE]) -> [usize; 256] {
    let mut green_index = [0usize; 256];
    let mut previous_col = 0;
    let mut start_pos = 0;

    for i in 0..NET_SIZE {
        let mut small_pos = i;
        let mut small_val = nodes[i].g;
        for (j, node) in nodes.iter().enumerate().skip(i + 1) {
            if node.g < small_val {
                small_pos = j;
                small_val = node.g;
            }
        }

        if i != small_pos {
            nodes.swap(i, small_pos);
        }

        let small_val = small_val as usize;
        if small_val != previous_col {
            green_index[previous_col] = (start_pos + i) >> 1;
            for entry in &mut green_index[previous_col + 1..small_val] {
                *entry = i;
            }
            previous_col = small_val;
            start_pos = i;
        }
    }

    green_index[previous_col] = (start_pos + MAX_NET_POS) >> 1;
    for entry in &mut green_index[previous_col + 1..] {
        *entry = MAX_NET_POS;
    }

    green_index
}
