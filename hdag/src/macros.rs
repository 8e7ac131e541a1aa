/*
 * Created on Sat Feb 08 2025
 *
 * This file is a part of hdag
 * hdag is a free and open-source hash-addressed DAG store that turns raw
 * adjacency streams into compact, queryable, memory-mapped graph bundles
 * without compromising on correctness or performance.
 *
 * Copyright (c) 2025, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

macro_rules! sizeof {
    ($ty:ty) => {
        ::core::mem::size_of::<$ty>()
    };
    ($ty:ty, $by:expr) => {
        ::core::mem::size_of::<$ty>() * $by
    };
}

/// Non-short-circuiting conjunction of checks. All expressions are evaluated;
/// use where validation should not leak timing or branch structure.
macro_rules! okay {
    ($($expr:expr),* $(,)?) => {
        $(($expr) &)* true
    }
}
